//! Middleware wrapping the store's dispatch.
//!
//! Middleware run in registration order. Each one receives the current
//! state, the action, and a [`Next`] handle for the rest of the chain. A
//! middleware either:
//!
//! - forwards the original action with `next.run(action)`,
//! - forwards a transformed action, or
//! - swallows the action by returning without calling `next`, in which case
//!   the store keeps its current state.
//!
//! `Next` is consumed by [`Next::run`], so the chain can be continued at
//! most once per dispatch.
//!
//! # Example
//!
//! ```
//! use colloquy_store::action::Action;
//! use colloquy_store::middleware::{Middleware, Next};
//! use colloquy_store::state::State;
//! use colloquy_store::store::StoreError;
//!
//! /// Drops every action of type `NOISE`.
//! struct DropNoise;
//!
//! impl Middleware for DropNoise {
//!     fn dispatch(&self, state: &State, action: Action, next: Next<'_>) -> Result<State, StoreError> {
//!         if action.is("NOISE") {
//!             return Ok(state.clone());
//!         }
//!         next.run(action)
//!     }
//! }
//! ```

use core::fmt;

use crate::action::Action;
use crate::reducer::Reducer;
use crate::state::State;
use crate::store::StoreError;

/// Intercepts actions on their way to the reducer.
pub trait Middleware: Send + Sync {
    /// Returns the middleware's name for logging and error reporting.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Handles one action.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the dispatch. The store state is left
    /// unchanged when the chain fails.
    fn dispatch(&self, state: &State, action: Action, next: Next<'_>) -> Result<State, StoreError>;
}

impl fmt::Debug for dyn Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name())
            .finish()
    }
}

/// Type alias for boxed middleware stored in a store.
pub type BoxedMiddleware = Box<dyn Middleware>;

/// The remainder of a middleware chain, ending in the reducer.
pub struct Next<'a> {
    chain: &'a [BoxedMiddleware],
    reducer: &'a dyn Reducer,
    state: &'a State,
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [BoxedMiddleware], reducer: &'a dyn Reducer, state: &'a State) -> Self {
        Self {
            chain,
            reducer,
            state,
        }
    }

    /// Passes `action` to the next middleware, or to the reducer if this is
    /// the end of the chain.
    ///
    /// # Errors
    ///
    /// Propagates the first error raised further down the chain.
    pub fn run(self, action: Action) -> Result<State, StoreError> {
        match self.chain.split_first() {
            Some((head, rest)) => {
                tracing::trace!(middleware = head.name(), action = %action.action_type(), "middleware");
                head.dispatch(self.state, action, Next::new(rest, self.reducer, self.state))
            }
            None => Ok(self.reducer.reduce(&action, self.state)),
        }
    }

    /// Returns the number of middleware left before the reducer.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.chain.len()
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// Logs every action passing through the store at `debug` level, together
/// with whether it produced a new snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionLogger;

impl Middleware for ActionLogger {
    fn name(&self) -> &str {
        "action_logger"
    }

    fn dispatch(&self, state: &State, action: Action, next: Next<'_>) -> Result<State, StoreError> {
        let action_type = action.action_type().clone();
        let next_state = next.run(action)?;
        tracing::debug!(
            action = %action_type,
            changed = !next_state.ptr_eq(state),
            "action dispatched"
        );
        Ok(next_state)
    }
}

//! The state store.
//!
//! A [`Store`] owns exactly one [`State`] snapshot and replaces it on every
//! effective dispatch. It performs no locking: each conversation owns its
//! own store, and `&mut self` on [`Store::dispatch`] guarantees a single
//! in-flight dispatch.
//!
//! # Example
//!
//! ```
//! use colloquy_store::action::Action;
//! use colloquy_store::reducer::{CombinedReducer, SliceReducer};
//! use colloquy_store::state::State;
//! use colloquy_store::store::Store;
//!
//! let reducer = CombinedReducer::new().with(
//!     "count",
//!     SliceReducer::new(|action: &Action, count: &u32| action.is("INCREMENT").then_some(count + 1)),
//! );
//! let mut store = Store::new(reducer, State::new());
//!
//! let state = store.dispatch(Action::new("INCREMENT")).unwrap();
//! assert_eq!(state.slice::<u32>("count"), Some(&1));
//! ```

use core::fmt;
use core::future::Future;

use crate::action::Action;
use crate::deferred;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::reducer::Reducer;
use crate::state::State;

/// A boxed, thread-safe error.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Errors that can occur while dispatching.
///
/// Reducer panics are not represented here: a panicking reducer is a
/// programming error and unwinds through [`Store::dispatch`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A deferred action's computation failed.
    #[error("deferred action failed: {0}")]
    DeferredAction(#[source] BoxError),

    /// A deferred action's computation panicked.
    #[error("deferred action panicked: {0}")]
    DeferredPanicked(String),

    /// A middleware rejected the action.
    #[error("middleware '{middleware}' rejected action '{action}': {message}")]
    Middleware {
        /// Name of the rejecting middleware.
        middleware: String,
        /// Type of the rejected action.
        action: String,
        /// Why the action was rejected.
        message: String,
    },
}

impl StoreError {
    /// Builds a [`StoreError::Middleware`] for `middleware` rejecting `action`.
    #[must_use]
    pub fn rejected(middleware: &dyn Middleware, action: &Action, message: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: middleware.name().to_string(),
            action: action.action_type().to_string(),
            message: message.into(),
        }
    }
}

/// Holds the current state and applies dispatched actions to it.
pub struct Store {
    state: State,
    reducer: Box<dyn Reducer>,
    middleware: Vec<BoxedMiddleware>,
}

impl Store {
    /// Creates a store from a reducer and an initial state.
    ///
    /// The reducer is run once with [`Action::init`] so that every slice it
    /// manages is present in the first snapshot.
    #[must_use]
    pub fn new<R>(reducer: R, initial: State) -> Self
    where
        R: Reducer + 'static,
    {
        Self::new_boxed(Box::new(reducer), initial)
    }

    /// Creates a store from an already boxed reducer.
    #[must_use]
    pub fn new_boxed(reducer: Box<dyn Reducer>, initial: State) -> Self {
        let state = reducer.reduce(&Action::init(), &initial);
        Self {
            state,
            reducer,
            middleware: Vec::new(),
        }
    }

    /// Appends a middleware to the chain and returns self for chaining.
    #[must_use]
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.add_middleware(middleware);
        self
    }

    /// Appends a middleware to the chain.
    pub fn add_middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware + 'static,
    {
        self.add_boxed_middleware(Box::new(middleware))
    }

    /// Appends an already boxed middleware to the chain.
    pub fn add_boxed_middleware(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.middleware.push(middleware);
        self
    }

    /// Returns the number of registered middleware.
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    /// Returns the current state snapshot.
    #[must_use]
    pub fn get_state(&self) -> State {
        self.state.clone()
    }

    /// Runs `action` through the middleware chain and the reducer, replaces
    /// the current state with the result and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if a middleware aborts the dispatch. The state is
    /// unchanged in that case.
    pub fn dispatch(&mut self, action: Action) -> Result<State, StoreError> {
        let next = Next::new(&self.middleware, self.reducer.as_ref(), &self.state).run(action)?;
        self.state = next.clone();
        Ok(next)
    }

    /// Resolves a deferred action and dispatches the result.
    ///
    /// Only this call is suspended while the computation runs. Once it
    /// settles, the resolved action goes through [`dispatch`](Self::dispatch)
    /// like any other action.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DeferredAction`] if the computation fails,
    /// [`StoreError::DeferredPanicked`] if it panics, or any error raised by
    /// the middleware chain.
    pub async fn dispatch_deferred<F, E>(&mut self, deferred: F) -> Result<State, StoreError>
    where
        F: Future<Output = Result<Action, E>>,
        E: Into<BoxError>,
    {
        let action = deferred::resolve(deferred).await.inspect_err(|err| {
            tracing::warn!(error = %err, "deferred action did not resolve");
        })?;
        tracing::trace!(action = %action.action_type(), "deferred action resolved");
        self.dispatch(action)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("middleware", &self.middleware)
            .finish_non_exhaustive()
    }
}

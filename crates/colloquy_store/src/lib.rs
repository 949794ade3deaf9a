//! A minimal unidirectional state store for colloquy (Layer 1).
//!
//! `colloquy_store` holds one immutable [`State`] value and changes it only
//! through dispatched [`Action`]s reduced by pure reducers.
//!
//! # Core Concepts
//!
//! - [`Action`] - Immutable, tagged description of a state change
//! - [`State`] - Immutable snapshot made of named, typed slices
//! - [`SliceReducer`] / [`CombinedReducer`] - Pure per-slice reducers and their composition
//! - [`Middleware`] - Interceptors wrapping dispatch, run in registration order
//! - [`Store`] - Owner of the current snapshot; resolves deferred actions
//!
//! # Example
//!
//! ```
//! use colloquy_store::prelude::*;
//!
//! #[derive(Debug, Default)]
//! struct Math {
//!     answer: Option<String>,
//! }
//!
//! let reducer = combine_reducers([(
//!     "math",
//!     Box::new(SliceReducer::new(|action: &Action, _math: &Math| {
//!         action.is("SET_ANSWER").then(|| Math {
//!             answer: action.payload::<String>().cloned(),
//!         })
//!     })) as BoxedSliceReducer,
//! )]);
//!
//! let mut store = Store::new(reducer, State::new()).with_middleware(ActionLogger);
//! store.dispatch(Action::with_payload("SET_ANSWER", "five".to_string())).unwrap();
//!
//! let state = store.get_state();
//! assert_eq!(state.slice::<Math>("math").unwrap().answer.as_deref(), Some("five"));
//! ```
//!
//! # Architecture
//!
//! - **Layer 1** (`colloquy_store`): actions, state, reducers, middleware (this crate)
//! - **Layer 2** (`colloquy_graph`): conversation graph and engine

/// Actions and action types.
pub mod action;

/// Deferred (asynchronous) actions.
pub mod deferred;

/// Middleware chain.
pub mod middleware;

/// Reducers and reducer composition.
pub mod reducer;

/// Immutable state snapshots.
pub mod state;

/// The store.
pub mod store;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::action::{Action, ActionType};
    pub use crate::deferred::{BoxFuture, DeferredAction};
    pub use crate::middleware::{ActionLogger, BoxedMiddleware, Middleware, Next};
    pub use crate::reducer::{
        BoxedSliceReducer, CombinedReducer, ErasedSliceReducer, Reducer, SliceReducer,
        combine_reducers,
    };
    pub use crate::state::{SliceRef, State};
    pub use crate::store::{BoxError, Store, StoreError};
}

pub use action::{Action, ActionType};
pub use middleware::{Middleware, Next};
pub use reducer::{CombinedReducer, Reducer, SliceReducer, combine_reducers};
pub use state::State;
pub use store::{Store, StoreError};

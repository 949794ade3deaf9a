//! Reducers and reducer composition.
//!
//! The reducer system follows the same type erasure pattern as the graph
//! crate's validators:
//!
//! - [`SliceReducer<T, F>`] - Typed reducer over one slice type `T`
//! - [`ErasedSliceReducer`] - Object-safe trait for type-erased storage
//! - [`BoxedSliceReducer`] - Type alias for boxed slice reducers
//! - [`CombinedReducer`] - Applies every slice reducer to its own named slice
//!
//! A typed reducer returns `Some(next)` when the action applies and `None`
//! otherwise. On `None` the previous slice is kept *as is*, so unrelated
//! actions leave slices pointer-equal to their prior value.
//!
//! # Example
//!
//! ```
//! use colloquy_store::action::Action;
//! use colloquy_store::reducer::{CombinedReducer, Reducer, SliceReducer};
//! use colloquy_store::state::State;
//!
//! #[derive(Debug, Default, Clone)]
//! struct Math {
//!     answer: Option<String>,
//! }
//!
//! let reducer = CombinedReducer::new().with(
//!     "math",
//!     SliceReducer::new(|action: &Action, _math: &Math| {
//!         action.is("SET_ANSWER").then(|| Math {
//!             answer: action.payload::<String>().cloned(),
//!         })
//!     }),
//! );
//!
//! let state = reducer.reduce(&Action::init(), &State::new());
//! let next = reducer.reduce(&Action::with_payload("SET_ANSWER", "five".to_string()), &state);
//! assert_eq!(next.slice::<Math>("math").unwrap().answer.as_deref(), Some("five"));
//! ```

use core::fmt;
use core::marker::PhantomData;
use std::sync::Arc;

use hashbrown::HashMap;

use crate::action::Action;
use crate::state::{SliceRef, State};

/// A top-level reducer over the whole [`State`].
///
/// Implementations must be pure. Returning a state that is
/// [`ptr_eq`](State::ptr_eq) to the input signals "nothing changed".
pub trait Reducer: Send + Sync {
    /// Computes the next state.
    fn reduce(&self, action: &Action, state: &State) -> State;
}

impl<F> Reducer for F
where
    F: Fn(&Action, &State) -> State + Send + Sync,
{
    fn reduce(&self, action: &Action, state: &State) -> State {
        self(action, state)
    }
}

/// Object-safe trait for type-erased slice reducers.
pub trait ErasedSliceReducer: Send + Sync {
    /// Reduces one slice.
    ///
    /// `slice` is `None` when the state has no slice under this reducer's
    /// name (or holds a value of a different type). Implementations must
    /// return the very same `Arc` when the action does not apply.
    fn reduce(&self, action: &Action, slice: Option<&SliceRef>) -> SliceRef;

    /// Returns the name of the slice type, for diagnostics.
    fn slice_type_name(&self) -> &'static str;
}

impl fmt::Debug for dyn ErasedSliceReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedSliceReducer")
            .field("slice_type", &self.slice_type_name())
            .finish()
    }
}

/// Type alias for boxed slice reducers.
pub type BoxedSliceReducer = Box<dyn ErasedSliceReducer>;

/// A typed reducer for slices of type `T`.
///
/// # Type Parameters
///
/// - `T`: The slice type; its [`Default`] stands in for an absent slice
/// - `F`: The reducer closure type
pub struct SliceReducer<T, F> {
    func: F,
    _marker: PhantomData<fn() -> T>,
}

impl<T, F> SliceReducer<T, F>
where
    T: Default + Send + Sync + 'static,
    F: Fn(&Action, &T) -> Option<T> + Send + Sync + 'static,
{
    /// Creates a new slice reducer from a closure.
    ///
    /// The closure returns `Some(next)` if the action applies to the slice,
    /// `None` to leave it unchanged.
    #[must_use]
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

impl<T, F> ErasedSliceReducer for SliceReducer<T, F>
where
    T: Default + Send + Sync + 'static,
    F: Fn(&Action, &T) -> Option<T> + Send + Sync + 'static,
{
    fn reduce(&self, action: &Action, slice: Option<&SliceRef>) -> SliceRef {
        let typed = slice.and_then(|value| {
            let typed = value.downcast_ref::<T>();
            if typed.is_none() {
                tracing::warn!(
                    expected = core::any::type_name::<T>(),
                    "slice holds a value of an unexpected type, treating it as absent"
                );
            }
            typed
        });

        match (typed, slice) {
            (Some(current), Some(current_ref)) => match (self.func)(action, current) {
                Some(next) => Arc::new(next),
                None => Arc::clone(current_ref),
            },
            _ => {
                let initial = T::default();
                match (self.func)(action, &initial) {
                    Some(next) => Arc::new(next),
                    None => Arc::new(initial),
                }
            }
        }
    }

    fn slice_type_name(&self) -> &'static str {
        core::any::type_name::<T>()
    }
}

impl<T, F> fmt::Debug for SliceReducer<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SliceReducer")
            .field("slice_type", &core::any::type_name::<T>())
            .finish()
    }
}

/// Applies a set of named slice reducers to a [`State`].
///
/// Slices that have no reducer are carried over untouched. When no slice
/// changes, [`reduce`](Reducer::reduce) returns the input state itself.
#[derive(Default)]
pub struct CombinedReducer {
    reducers: HashMap<Arc<str>, BoxedSliceReducer>,
}

impl CombinedReducer {
    /// Creates an empty combined reducer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `reducer` for the slice `name`, replacing any previous one.
    pub fn insert<R>(&mut self, name: impl Into<Arc<str>>, reducer: R) -> Option<BoxedSliceReducer>
    where
        R: ErasedSliceReducer + 'static,
    {
        self.insert_boxed(name, Box::new(reducer))
    }

    /// Registers an already boxed reducer for the slice `name`.
    pub fn insert_boxed(
        &mut self,
        name: impl Into<Arc<str>>,
        reducer: BoxedSliceReducer,
    ) -> Option<BoxedSliceReducer> {
        self.reducers.insert(name.into(), reducer)
    }

    /// Registers `reducer` for the slice `name` and returns self for chaining.
    #[must_use]
    pub fn with<R>(mut self, name: impl Into<Arc<str>>, reducer: R) -> Self
    where
        R: ErasedSliceReducer + 'static,
    {
        self.insert(name, reducer);
        self
    }

    /// Returns true if a reducer is registered for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.reducers.contains_key(name)
    }

    /// Returns the number of registered slice reducers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Returns true if no slice reducer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl Reducer for CombinedReducer {
    fn reduce(&self, action: &Action, state: &State) -> State {
        let mut next: Option<HashMap<Arc<str>, SliceRef>> = None;

        for (name, reducer) in &self.reducers {
            let previous = state.raw_slice(name);
            let reduced = reducer.reduce(action, previous);

            if previous.is_some_and(|previous| Arc::ptr_eq(previous, &reduced)) {
                continue;
            }

            next.get_or_insert_with(|| state.slices().clone())
                .insert(Arc::clone(name), reduced);
        }

        match next {
            Some(slices) => State::from_slices(slices),
            None => state.clone(),
        }
    }
}

impl fmt::Debug for CombinedReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.reducers.keys().map(|name| &**name).collect();
        names.sort_unstable();
        f.debug_struct("CombinedReducer")
            .field("slices", &names)
            .finish()
    }
}

/// Combines named slice reducers into a single [`CombinedReducer`].
///
/// # Example
///
/// ```
/// use colloquy_store::action::Action;
/// use colloquy_store::reducer::{combine_reducers, BoxedSliceReducer, SliceReducer};
///
/// let counter: BoxedSliceReducer = Box::new(SliceReducer::new(|action: &Action, count: &u32| {
///     action.is("INCREMENT").then_some(count + 1)
/// }));
/// let reducer = combine_reducers([("counter", counter)]);
/// assert!(reducer.contains("counter"));
/// ```
pub fn combine_reducers<I, K>(reducers: I) -> CombinedReducer
where
    I: IntoIterator<Item = (K, BoxedSliceReducer)>,
    K: Into<Arc<str>>,
{
    let mut combined = CombinedReducer::new();
    for (name, reducer) in reducers {
        combined.insert_boxed(name, reducer);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Counter {
        value: i32,
    }

    fn counter_reducer() -> SliceReducer<Counter, impl Fn(&Action, &Counter) -> Option<Counter>> {
        SliceReducer::new(|action: &Action, counter: &Counter| {
            if action.is("INCREMENT") {
                Some(Counter {
                    value: counter.value + 1,
                })
            } else {
                None
            }
        })
    }

    #[test]
    fn absent_slice_defaults() {
        let reducer = counter_reducer();
        let slice = reducer.reduce(&Action::init(), None);
        assert_eq!(slice.downcast_ref::<Counter>(), Some(&Counter { value: 0 }));

        let slice = reducer.reduce(&Action::new("INCREMENT"), None);
        assert_eq!(slice.downcast_ref::<Counter>(), Some(&Counter { value: 1 }));
    }

    #[test]
    fn unknown_action_keeps_same_arc() {
        let reducer = counter_reducer();
        let current: SliceRef = Arc::new(Counter { value: 4 });
        let next = reducer.reduce(&Action::new("UNKNOWN"), Some(&current));
        assert!(Arc::ptr_eq(&current, &next));
    }

    #[test]
    fn mistyped_slice_is_replaced_by_default() {
        let reducer = counter_reducer();
        let current: SliceRef = Arc::new("not a counter");
        let next = reducer.reduce(&Action::new("UNKNOWN"), Some(&current));
        assert!(next.downcast_ref::<Counter>().is_some());
    }

    #[test]
    fn combined_reducer_materialises_slices_on_init() {
        let reducer = CombinedReducer::new().with("counter", counter_reducer());
        let state = reducer.reduce(&Action::init(), &State::new());
        assert_eq!(state.slice::<Counter>("counter"), Some(&Counter { value: 0 }));
    }

    #[test]
    fn combined_reducer_returns_same_state_on_noop() {
        let reducer = CombinedReducer::new().with("counter", counter_reducer());
        let state = reducer.reduce(&Action::init(), &State::new());
        let next = reducer.reduce(&Action::new("UNKNOWN"), &state);
        assert!(next.ptr_eq(&state));
    }

    #[test]
    fn combined_reducer_keeps_unreduced_slices() {
        let reducer = CombinedReducer::new().with("counter", counter_reducer());
        let state = State::new()
            .with_slice("counter", Counter::default())
            .with_slice("opaque", 17_u64);
        let next = reducer.reduce(&Action::new("INCREMENT"), &state);

        assert_eq!(next.slice::<Counter>("counter"), Some(&Counter { value: 1 }));
        assert!(next.slice_ptr_eq(&state, "opaque"));
    }

    #[test]
    fn closures_are_reducers() {
        let reducer = |action: &Action, state: &State| {
            if action.is("MARK") {
                state.clone().with_slice("marked", true)
            } else {
                state.clone()
            }
        };
        let next = Reducer::reduce(&reducer, &Action::new("MARK"), &State::new());
        assert_eq!(next.slice::<bool>("marked"), Some(&true));
    }

    #[test]
    fn combine_reducers_collects_all() {
        let a: BoxedSliceReducer = Box::new(counter_reducer());
        let b: BoxedSliceReducer = Box::new(counter_reducer());
        let combined = combine_reducers([("a", a), ("b", b)]);
        assert_eq!(combined.len(), 2);
        assert_eq!(format!("{combined:?}"), r#"CombinedReducer { slices: ["a", "b"] }"#);
    }
}

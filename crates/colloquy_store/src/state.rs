//! Immutable state snapshots.
//!
//! A [`State`] is a map from slice name to a typed, shared slice value.
//! Snapshots are never mutated: reducers produce a new `State` that shares
//! every unchanged slice with its predecessor.
//!
//! # Slices
//!
//! Any `Send + Sync + 'static` type can be a slice. Slices are stored behind
//! an [`Arc`], so "unchanged" is observable as pointer equality via
//! [`State::slice_ptr_eq`].
//!
//! # Example
//!
//! ```
//! use colloquy_store::state::State;
//!
//! #[derive(Debug, Default)]
//! struct Math {
//!     answer: Option<String>,
//! }
//!
//! let state = State::new().with_slice("math", Math::default());
//! assert!(state.slice::<Math>("math").is_some());
//! assert!(state.slice::<u32>("math").is_none());
//! ```

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;

/// A type-erased, shared slice value.
pub type SliceRef = Arc<dyn Any + Send + Sync>;

/// An immutable snapshot of the store's state.
///
/// Cloning a `State` is a reference count bump.
#[derive(Clone, Default)]
pub struct State {
    slices: Arc<HashMap<Arc<str>, SliceRef>>,
}

impl State {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_slices(slices: HashMap<Arc<str>, SliceRef>) -> Self {
        Self {
            slices: Arc::new(slices),
        }
    }

    /// Returns a copy of this state with `name` set to `value`.
    ///
    /// Intended for building initial states; at runtime, slices change only
    /// through dispatched actions.
    #[must_use]
    pub fn with_slice<T>(self, name: impl Into<Arc<str>>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.with_slice_ref(name, Arc::new(value))
    }

    /// Returns a copy of this state with `name` set to an already shared value.
    #[must_use]
    pub fn with_slice_ref(self, name: impl Into<Arc<str>>, value: SliceRef) -> Self {
        let mut slices = Arc::unwrap_or_clone(self.slices);
        slices.insert(name.into(), value);
        Self::from_slices(slices)
    }

    /// Returns the slice `name` if it exists and has type `T`.
    #[must_use]
    pub fn slice<T: Any>(&self, name: &str) -> Option<&T> {
        self.slices.get(name)?.downcast_ref::<T>()
    }

    /// Returns a shared handle to the slice `name` if it exists and has type `T`.
    #[must_use]
    pub fn slice_arc<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.slices.get(name)?.clone().downcast::<T>().ok()
    }

    /// Returns the type-erased slice `name`.
    #[must_use]
    pub fn raw_slice(&self, name: &str) -> Option<&SliceRef> {
        self.slices.get(name)
    }

    /// Returns true if a slice called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slices.contains_key(name)
    }

    /// Iterates over the slice names in this state, in no particular order.
    pub fn slice_names(&self) -> impl Iterator<Item = &str> {
        self.slices.keys().map(|name| &**name)
    }

    /// Returns the number of slices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Returns true if the state holds no slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Returns true if both states are the same snapshot.
    #[must_use]
    pub fn ptr_eq(&self, other: &State) -> bool {
        Arc::ptr_eq(&self.slices, &other.slices)
    }

    /// Returns true if the slice `name` is the same shared value in both states.
    ///
    /// Two absent slices compare equal.
    #[must_use]
    pub fn slice_ptr_eq(&self, other: &State, name: &str) -> bool {
        match (self.raw_slice(name), other.raw_slice(name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn slices(&self) -> &HashMap<Arc<str>, SliceRef> {
        &self.slices
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.slice_names().collect();
        names.sort_unstable();
        f.debug_struct("State").field("slices", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Counter {
        value: i32,
    }

    #[test]
    fn typed_slice_access() {
        let state = State::new().with_slice("counter", Counter { value: 2 });
        assert_eq!(state.slice::<Counter>("counter"), Some(&Counter { value: 2 }));
        assert!(state.slice::<String>("counter").is_none());
        assert!(state.slice::<Counter>("missing").is_none());
    }

    #[test]
    fn with_slice_leaves_original_untouched() {
        let first = State::new().with_slice("a", 1_u8);
        let second = first.clone().with_slice("b", 2_u8);

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert!(first.slice_ptr_eq(&second, "a"));
        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn slice_arc_shares_value() {
        let state = State::new().with_slice("counter", Counter { value: 9 });
        let a = state.slice_arc::<Counter>("counter").unwrap();
        let b = state.slice_arc::<Counter>("counter").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn debug_lists_sorted_slice_names() {
        let state = State::new().with_slice("b", 1_u8).with_slice("a", 2_u8);
        assert_eq!(format!("{state:?}"), r#"State { slices: ["a", "b"] }"#);
    }

    #[test]
    fn absent_slices_compare_equal() {
        let a = State::new();
        let b = State::new().with_slice("x", 1_u8);
        assert!(a.slice_ptr_eq(&b, "missing"));
        assert!(!a.slice_ptr_eq(&b, "x"));
    }
}

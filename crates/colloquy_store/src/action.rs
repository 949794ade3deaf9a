//! Actions: the unit of state change.
//!
//! An [`Action`] is an immutable, tagged value. The [`ActionType`]
//! discriminator tells reducers which clause applies; the optional payload
//! is type-erased so that domain actions can travel through the store
//! without the store knowing their shape.
//!
//! # Example
//!
//! ```
//! use colloquy_store::action::Action;
//!
//! let action = Action::with_payload("SET_ANSWER", String::from("five"));
//! assert!(action.is("SET_ANSWER"));
//! assert_eq!(action.payload::<String>().map(String::as_str), Some("five"));
//! ```

use core::any::Any;
use core::fmt;
use std::sync::Arc;

/// Action type dispatched once by [`Store::new`](crate::store::Store::new)
/// so that every slice reducer can materialise its default value.
pub const INIT: &str = "@@colloquy/INIT";

/// Discriminator for an [`Action`].
///
/// Internally uses `Arc<str>` for cheap cloning (reference count bump only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionType(Arc<str>);

impl ActionType {
    /// Creates an action type from a name.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the type name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ActionType {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl PartialEq<str> for ActionType {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ActionType {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

/// An immutable description of a state change.
///
/// Cloning an action is cheap: the payload is shared behind an [`Arc`].
#[derive(Clone)]
pub struct Action {
    action_type: ActionType,
    payload: Option<Arc<dyn Any + Send + Sync>>,
    payload_type: Option<&'static str>,
}

impl Action {
    /// Creates an action without a payload.
    #[must_use]
    pub fn new(action_type: impl Into<ActionType>) -> Self {
        Self {
            action_type: action_type.into(),
            payload: None,
            payload_type: None,
        }
    }

    /// Creates an action carrying `payload`.
    #[must_use]
    pub fn with_payload<P>(action_type: impl Into<ActionType>, payload: P) -> Self
    where
        P: Any + Send + Sync,
    {
        Self {
            action_type: action_type.into(),
            payload: Some(Arc::new(payload)),
            payload_type: Some(core::any::type_name::<P>()),
        }
    }

    /// The store's initialisation action.
    #[must_use]
    pub fn init() -> Self {
        Self::new(INIT)
    }

    /// Returns the action's discriminator.
    #[must_use]
    pub fn action_type(&self) -> &ActionType {
        &self.action_type
    }

    /// Returns true if this action's type is `action_type`.
    #[must_use]
    pub fn is(&self, action_type: &str) -> bool {
        self.action_type == action_type
    }

    /// Returns true if the action carries a payload.
    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Returns the payload if it is present and of type `P`.
    #[must_use]
    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.as_deref()?.downcast_ref::<P>()
    }

    /// Returns the payload's type name, for diagnostics.
    #[must_use]
    pub fn payload_type_name(&self) -> Option<&'static str> {
        self.payload_type
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("type", &self.action_type.as_str())
            .field("payload", &self.payload_type)
            .finish()
    }
}

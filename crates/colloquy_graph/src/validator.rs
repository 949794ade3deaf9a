//! Edge validators and side effects.
//!
//! An [`Edge`](crate::edge::Edge) may carry a validator, which decides
//! whether the edge is eligible for the current intent, and an effect, which
//! produces a domain [`Action`] once the edge is chosen. Both see the intent
//! and a read-only [`State`] snapshot.
//!
//! # Architecture
//!
//! Both follow the same type erasure pattern:
//!
//! - [`Validator<F>`] / [`Effect<F>`] - Closure-backed implementations
//! - [`SlotValidator`] / [`SlotEffect`] - Ready-made slot-driven implementations
//! - [`ErasedValidator`] / [`ErasedEffect`] - Object-safe traits stored on edges
//! - [`BoxedValidator`] / [`BoxedEffect`] - Type aliases for the boxed forms
//!
//! # Example
//!
//! ```
//! use colloquy_graph::validator::{SlotEffect, SlotValidator, Validator};
//! use colloquy_graph::intent::Intent;
//! use colloquy_store::state::State;
//! use colloquy_graph::validator::{ErasedEffect, ErasedValidator};
//!
//! let yes = SlotValidator::new("YES", ["yes", "yeah", "affirmative"]);
//! assert!(yes.validate(&Intent::new("YES").with_slot("YES", "yeah"), &State::new()));
//!
//! let always = Validator::new(|_intent: &Intent, _state: &State| true);
//! assert!(always.validate(&Intent::new("ANY"), &State::new()));
//!
//! let set_answer = SlotEffect::new("answer", "SET_ANSWER");
//! let intent = Intent::new("NUMBER_ANSWER").with_slot("answer", "five");
//! let action = set_answer.apply(&intent, &State::new()).unwrap();
//! assert_eq!(action.payload::<String>().map(String::as_str), Some("five"));
//! ```

use core::fmt;
use hashbrown::HashSet;

use colloquy_store::action::{Action, ActionType};
use colloquy_store::state::State;

use crate::intent::Intent;
use crate::node::MappingError;

/// Object-safe trait for type-erased edge validators.
pub trait ErasedValidator: Send + Sync {
    /// Returns true if the edge may be taken for `intent` in `state`.
    fn validate(&self, intent: &Intent, state: &State) -> bool;

    /// Returns a name for debugging and tracing.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn ErasedValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedValidator")
            .field("name", &self.name())
            .finish()
    }
}

/// Type alias for boxed validators stored on edges.
pub type BoxedValidator = Box<dyn ErasedValidator>;

/// Object-safe trait for type-erased edge side effects.
pub trait ErasedEffect: Send + Sync {
    /// Produces the action to dispatch once the edge is chosen.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the action cannot be built from the
    /// intent and state.
    fn apply(&self, intent: &Intent, state: &State) -> Result<Action, MappingError>;

    /// Returns a name for debugging and tracing.
    fn name(&self) -> &str;
}

impl fmt::Debug for dyn ErasedEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedEffect")
            .field("name", &self.name())
            .finish()
    }
}

/// Type alias for boxed effects stored on edges.
pub type BoxedEffect = Box<dyn ErasedEffect>;

/// A validator backed by a closure.
pub struct Validator<F> {
    validate: F,
}

impl<F> Validator<F>
where
    F: Fn(&Intent, &State) -> bool + Send + Sync + 'static,
{
    /// Wraps `validate`.
    #[must_use]
    pub fn new(validate: F) -> Self {
        Self { validate }
    }
}

impl<F> ErasedValidator for Validator<F>
where
    F: Fn(&Intent, &State) -> bool + Send + Sync + 'static,
{
    fn validate(&self, intent: &Intent, state: &State) -> bool {
        (self.validate)(intent, state)
    }

    fn name(&self) -> &str {
        core::any::type_name::<F>()
    }
}

impl<F> fmt::Debug for Validator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("closure", &core::any::type_name::<F>())
            .finish()
    }
}

/// Accepts an intent when one of its slots holds one of a fixed set of
/// values. The comparison is exact.
#[derive(Debug, Clone)]
pub struct SlotValidator {
    slot: String,
    accepted: HashSet<String>,
}

impl SlotValidator {
    /// Accepts intents whose `slot` is one of `accepted`.
    #[must_use]
    pub fn new<I, S>(slot: impl Into<String>, accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slot: slot.into(),
            accepted: accepted.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the inspected slot name.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }
}

impl ErasedValidator for SlotValidator {
    fn validate(&self, intent: &Intent, _state: &State) -> bool {
        intent
            .slot(&self.slot)
            .is_some_and(|value| self.accepted.contains(value))
    }

    fn name(&self) -> &str {
        "slot_validator"
    }
}

/// An effect backed by a closure.
pub struct Effect<F> {
    apply: F,
}

impl<F> Effect<F>
where
    F: Fn(&Intent, &State) -> Result<Action, MappingError> + Send + Sync + 'static,
{
    /// Wraps `apply`.
    #[must_use]
    pub fn new(apply: F) -> Self {
        Self { apply }
    }
}

impl<F> ErasedEffect for Effect<F>
where
    F: Fn(&Intent, &State) -> Result<Action, MappingError> + Send + Sync + 'static,
{
    fn apply(&self, intent: &Intent, state: &State) -> Result<Action, MappingError> {
        (self.apply)(intent, state)
    }

    fn name(&self) -> &str {
        core::any::type_name::<F>()
    }
}

impl<F> fmt::Debug for Effect<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("closure", &core::any::type_name::<F>())
            .finish()
    }
}

/// Emits an action of a fixed type whose `String` payload is the value of
/// one intent slot.
#[derive(Debug, Clone)]
pub struct SlotEffect {
    slot: String,
    action_type: ActionType,
}

impl SlotEffect {
    /// Copies `slot` into the payload of an `action_type` action.
    #[must_use]
    pub fn new(slot: impl Into<String>, action_type: impl Into<ActionType>) -> Self {
        Self {
            slot: slot.into(),
            action_type: action_type.into(),
        }
    }
}

impl ErasedEffect for SlotEffect {
    fn apply(&self, intent: &Intent, _state: &State) -> Result<Action, MappingError> {
        let value = intent
            .slot(&self.slot)
            .ok_or_else(|| MappingError::MissingSlot {
                intent: intent.id().to_string(),
                slot: self.slot.clone(),
            })?;
        Ok(Action::with_payload(self.action_type.clone(), value.to_string()))
    }

    fn name(&self) -> &str {
        "slot_effect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_validator_matches_exactly() {
        let validator = SlotValidator::new("YES", ["yes", "yeah", "affirmative"]);
        let state = State::new();

        for accepted in ["yes", "yeah", "affirmative"] {
            let intent = Intent::new("YES").with_slot("YES", accepted);
            assert!(validator.validate(&intent, &state), "{accepted}");
        }
        assert!(!validator.validate(&Intent::new("YES").with_slot("YES", "Yes"), &state));
        assert!(!validator.validate(&Intent::new("YES").with_slot("YES", "nope"), &state));
        assert!(!validator.validate(&Intent::new("YES"), &state));
    }

    #[test]
    fn closure_validator_sees_state() {
        let state = State::new().with_slice("flag", true);
        let validator = Validator::new(|_intent, state: &State| {
            state.slice::<bool>("flag").copied().unwrap_or(false)
        });

        assert!(validator.validate(&Intent::new("ANY"), &state));
        assert!(!validator.validate(&Intent::new("ANY"), &State::new()));
    }

    #[test]
    fn slot_effect_requires_the_slot() {
        let effect = SlotEffect::new("answer", "SET_ANSWER");

        let action = effect
            .apply(&Intent::new("NUMBER_ANSWER").with_slot("answer", "6"), &State::new())
            .unwrap();
        assert!(action.is("SET_ANSWER"));
        assert_eq!(action.payload::<String>().map(String::as_str), Some("6"));

        let err = effect
            .apply(&Intent::new("NUMBER_ANSWER"), &State::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "intent 'NUMBER_ANSWER' has no slot 'answer'"
        );
    }

    #[test]
    fn closure_effect_may_fail() {
        let effect = Effect::new(|intent: &Intent, _state: &State| {
            Err(MappingError::Failed(format!("cannot handle {intent}")))
        });
        let err = effect.apply(&Intent::new("X"), &State::new()).unwrap_err();
        assert_eq!(err.to_string(), "mapping failed: cannot handle X");
    }
}

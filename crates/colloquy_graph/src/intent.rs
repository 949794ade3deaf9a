//! Intents and the intent detection contract.
//!
//! The engine never classifies text itself. It hands each incoming message
//! to an [`IntentDetector`] and routes on the [`Intent`] it yields.

use core::fmt;

use colloquy_store::deferred::BoxFuture;
use hashbrown::HashMap;

/// The classified meaning of one user message.
///
/// An intent is an identifier plus a map of named slots extracted from the
/// text (for example `answer = "five"`). It lives for a single resolution
/// cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    id: String,
    slots: HashMap<String, String>,
}

impl Intent {
    /// Creates an intent without slots.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slots: HashMap::new(),
        }
    }

    /// Adds a slot and returns self for chaining.
    #[must_use]
    pub fn with_slot(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(name.into(), value.into());
        self
    }

    /// Returns the intent identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the value of a slot, if present.
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(String::as_str)
    }

    /// Returns all slots.
    #[must_use]
    pub fn slots(&self) -> &HashMap<String, String> {
        &self.slots
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Error raised by an [`IntentDetector`] that could not run.
///
/// Text the detector merely fails to classify is not an error: it yields
/// `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionError(String);

impl DetectionError {
    /// Creates a detection error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intent detection failed: {}", self.0)
    }
}

impl core::error::Error for DetectionError {}

/// Classifies raw text into an optional [`Intent`].
///
/// Implementations are usually backed by a remote NLU service, so detection
/// is asynchronous.
///
/// # Example
///
/// ```
/// use colloquy_graph::intent::{DetectionError, Intent, IntentDetector};
/// use colloquy_store::deferred::BoxFuture;
///
/// struct Affirmation;
///
/// impl IntentDetector for Affirmation {
///     fn detect_intent<'a>(
///         &'a self,
///         text: &'a str,
///     ) -> BoxFuture<'a, Result<Option<Intent>, DetectionError>> {
///         Box::pin(async move {
///             Ok((text == "yes").then(|| Intent::new("YES").with_slot("YES", text)))
///         })
///     }
/// }
/// ```
pub trait IntentDetector: Send + Sync {
    /// Detects the intent of `text`.
    ///
    /// Returns `Ok(None)` when the text could not be classified.
    ///
    /// # Errors
    ///
    /// Returns a [`DetectionError`] if the detector itself failed.
    fn detect_intent<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Option<Intent>, DetectionError>>;
}

impl fmt::Debug for dyn IntentDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntentDetector").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_looked_up_by_name() {
        let intent = Intent::new("NUMBER_ANSWER").with_slot("answer", "five");

        assert_eq!(intent.id(), "NUMBER_ANSWER");
        assert_eq!(intent.slot("answer"), Some("five"));
        assert_eq!(intent.slot("missing"), None);
        assert_eq!(intent.slots().len(), 1);
        assert_eq!(intent.to_string(), "NUMBER_ANSWER");
    }

    #[test]
    fn detection_error_display() {
        let err = DetectionError::new("service unavailable");
        assert_eq!(err.message(), "service unavailable");
        assert_eq!(
            err.to_string(),
            "intent detection failed: service unavailable"
        );
    }
}

//! A keyword intent detector backed by regular expressions.

use colloquy_graph::intent::{DetectionError, Intent, IntentDetector};
use colloquy_store::deferred::BoxFuture;
use regex::Regex;

struct Rule {
    intent: String,
    pattern: Regex,
}

/// Classifies text with an ordered list of patterns.
///
/// The first pattern that matches the trimmed text decides the intent. Named
/// capture groups become slots, lowercased.
#[derive(Default)]
pub struct KeywordDetector {
    rules: Vec<Rule>,
}

impl KeywordDetector {
    /// Creates a detector without rules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule mapping `pattern` to `intent`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn with_rule(mut self, intent: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        self.rules.push(Rule {
            intent: intent.into(),
            pattern: Regex::new(pattern)?,
        });
        Ok(self)
    }

    /// Returns the intent of the first matching rule.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<Intent> {
        let text = text.trim();
        self.rules.iter().find_map(|rule| {
            let captures = rule.pattern.captures(text)?;
            let intent = rule
                .pattern
                .capture_names()
                .flatten()
                .filter_map(|name| captures.name(name).map(|m| (name, m.as_str().to_lowercase())))
                .fold(Intent::new(rule.intent.as_str()), |intent, (name, value)| {
                    intent.with_slot(name, value)
                });
            Some(intent)
        })
    }
}

impl IntentDetector for KeywordDetector {
    fn detect_intent<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<Option<Intent>, DetectionError>> {
        Box::pin(async move {
            let intent = self.classify(text);
            tracing::trace!(text, intent = ?intent.as_ref().map(Intent::id), "classified");
            Ok(intent)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> KeywordDetector {
        KeywordDetector::new()
            .with_rule("NUMBER", r"^(?i)(?P<value>\d+|five)$")
            .unwrap()
            .with_rule("GREETING", r"(?i)\bhello\b")
            .unwrap()
    }

    #[test]
    fn named_groups_become_lowercase_slots() {
        let intent = detector().classify("  FIVE ").unwrap();
        assert_eq!(intent.id(), "NUMBER");
        assert_eq!(intent.slot("value"), Some("five"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let detector = detector().with_rule("ANYTHING", ".*").unwrap();

        assert_eq!(detector.classify("42").unwrap().id(), "NUMBER");
        assert_eq!(detector.classify("well hello there").unwrap().id(), "GREETING");
        assert_eq!(detector.classify("purple").unwrap().id(), "ANYTHING");
    }

    #[test]
    fn unmatched_text_is_not_classified() {
        assert_eq!(detector().classify("purple"), None);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(KeywordDetector::new().with_rule("BROKEN", "(").is_err());
    }

    #[tokio::test]
    async fn detects_asynchronously() {
        let intent = detector().detect_intent("hello").await.unwrap();
        assert_eq!(intent.map(|i| i.id().to_string()).as_deref(), Some("GREETING"));
    }
}

//! The math quiz graph, its slice and its detector.
//!
//! ```text
//!             NUMBER_ANSWER (5)          YES
//!   ┌──────────┐ ──────────▶ ┌───────┐ ─────▶ back to 1
//!   │ 1 ask    │             │ 5 ok  │
//!   └──────────┘ ──────────▶ └───────┘
//!        ▲     NUMBER_ANSWER   ┌───────┐  YES
//!        │       (other) ────▶ │ 4 no  │ ─────▶ back to 1
//!        │                     └───────┘
//!        │ YES   ┌──────────┐
//!        └────── │ 3 bye    │ ◀── NO (fallback)
//!                └──────────┘
//!   HELP (fallback) ──▶ 2 help ── YES ──▶ 1
//! ```

use std::sync::Arc;

use colloquy_graph::prelude::*;
use colloquy_store::prelude::*;
use serde_json::{Value, json};

use crate::detector::KeywordDetector;

/// Asks the question.
pub const QUESTION: NodeId = NodeId::new(1);
/// Explains how to answer.
pub const HELP: NodeId = NodeId::new(2);
/// Ends the quiz.
pub const GOODBYE: NodeId = NodeId::new(3);
/// Reached on a wrong answer.
pub const WRONG: NodeId = NodeId::new(4);
/// Reached on the right answer.
pub const RIGHT: NodeId = NodeId::new(5);

/// Records the user's latest answer.
pub const SET_ANSWER: &str = "quiz/SET_ANSWER";
/// Name of the quiz slice.
pub const QUIZ_SLICE: &str = "quiz";

const AFFIRMATIVE: [&str; 5] = ["yes", "yeah", "yep", "sure", "affirmative"];

/// Quiz progress kept in the store next to the conversation slice.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Quiz {
    /// The latest answer, as typed.
    pub answer: Option<String>,
    /// Number of answers given so far.
    pub attempts: u32,
}

/// Reducer for the [`QUIZ_SLICE`] slice.
#[must_use]
pub fn quiz_reducer() -> impl ErasedSliceReducer {
    SliceReducer::new(|action: &Action, quiz: &Quiz| {
        if !action.is(SET_ANSWER) {
            return None;
        }
        Some(Quiz {
            answer: action.payload::<String>().cloned(),
            attempts: quiz.attempts.saturating_add(1),
        })
    })
}

/// Builds the quiz detector.
///
/// # Errors
///
/// Returns the regex error if a pattern does not compile.
pub fn quiz_detector() -> Result<KeywordDetector, regex::Error> {
    KeywordDetector::new()
        .with_rule(
            "NUMBER_ANSWER",
            r"^(?i)(?P<answer>\d+|zero|one|two|three|four|five|six|seven|eight|nine|ten)$",
        )?
        .with_rule("YES", r"^(?i)(?P<YES>yes|yeah|yep|sure|affirmative|ok)\b")?
        .with_rule("NO", r"^(?i)(no|nope|nah|quit|exit)\b")?
        .with_rule("HELP", r"(?i)\b(help|hint|\?)")
}

fn again() -> Edge {
    Edge::new("YES", QUESTION).with_validator(SlotValidator::new("YES", AFFIRMATIVE))
}

fn messages(lines: &[&str]) -> Value {
    json!({ "message": lines })
}

/// Builds the quiz graph.
///
/// # Errors
///
/// Returns [`GraphError::DuplicateNode`] only if the node ids clash.
pub fn quiz_graph() -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    graph
        .add_node(
            ResponseSuggestingNode::new(QUESTION, "What is 2 + 3?")
                .with_suggestion("five")
                .with_suggestion("4")
                .with_button(NodeButton::new("Help", "help"))
                .with_edge(
                    Edge::new("NUMBER_ANSWER", RIGHT)
                        .with_id("RIGHT_ANSWER")
                        .with_validator(SlotValidator::new("answer", ["5", "five"]))
                        .with_effect(SlotEffect::new("answer", SET_ANSWER)),
                )
                .with_edge(
                    Edge::new("NUMBER_ANSWER", WRONG)
                        .with_id("WRONG_ANSWER")
                        .with_effect(SlotEffect::new("answer", SET_ANSWER)),
                ),
        )?
        .add_node(
            ResponseSuggestingNode::new(
                HELP,
                "Add the two numbers and reply with the sum, as digits or a word.",
            )
            .with_suggestion("yes")
            .with_metadata(messages(&["Ready to try?"]))
            .with_edge(again()),
        )?
        .add_node(
            ConversationNode::new(GOODBYE)
                .with_metadata(messages(&["Thanks for playing.", "Say yes to start over."]))
                .with_edge(again()),
        )?
        .add_node(
            ConversationNode::new(WRONG)
                .with_metadata(messages(&["{{answer}} is not right.", "Try again?"]))
                .with_edge(again())
                .with_edge(Edge::new("NO", GOODBYE)),
        )?
        .add_node(
            ConversationNode::new(RIGHT)
                .with_metadata(messages(&["{{answer}} is right!", "Another round?"]))
                .with_edge(again())
                .with_edge(Edge::new("NO", GOODBYE)),
        )?;
    Ok(graph)
}

/// Builds an engine over `graph` starting at the question, with the quiz
/// slice and the quiz fallbacks registered.
#[must_use]
pub fn quiz_engine<D>(graph: Arc<Graph>, detector: D) -> ConversationEngineBuilder
where
    D: IntentDetector + 'static,
{
    ConversationEngine::builder(graph, detector)
        .starting_at(QUESTION)
        .with_reducer(QUIZ_SLICE, quiz_reducer())
        .with_fallback("HELP", HELP)
        .with_fallback("NO", GOODBYE)
}

/// Returns the lines to show when `node` is reached.
///
/// Content and suggestions of response-suggesting nodes come first, then
/// the `message` entries of the node metadata with `{{answer}}` replaced by
/// the latest answer.
#[must_use]
pub fn render(node: &Node, state: &State) -> Vec<String> {
    let mut lines = Vec::new();
    if let Node::ResponseSuggesting(node) = node {
        lines.push(node.content.clone());
        if !node.suggested_responses.is_empty() {
            lines.push(format!("(try: {})", node.suggested_responses.join(" | ")));
        }
    }

    let answer = state
        .slice::<Quiz>(QUIZ_SLICE)
        .and_then(|quiz| quiz.answer.as_deref())
        .unwrap_or("");
    if let Some(Value::Array(entries)) = node.metadata().get("message") {
        lines.extend(
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(|line| line.replace("{{answer}}", answer)),
        );
    }
    lines
}

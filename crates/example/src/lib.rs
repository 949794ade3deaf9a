//! Example math quiz built with colloquy.
//!
//! The quiz asks one question, judges the answer with edge validators and
//! records it in its own store slice through an edge effect. Replies are
//! classified by a [`KeywordDetector`], a small regex-based stand-in for a
//! real NLU service.

mod detector;
mod quiz;

pub use detector::KeywordDetector;
pub use quiz::{
    GOODBYE, HELP, QUESTION, QUIZ_SLICE, Quiz, RIGHT, SET_ANSWER, WRONG, quiz_detector,
    quiz_engine, quiz_graph, quiz_reducer, render,
};

//! The conversation slice and its actions.
//!
//! The engine records its progress in the [`ConversationState`] slice,
//! stored under [`CONVERSATION_SLICE`]. It changes that slice only by
//! dispatching the actions built in [`action`], which
//! [`reduce_conversation`] folds into the slice.

use colloquy_store::action::Action;
use colloquy_store::reducer::SliceReducer;
use colloquy_store::state::State;

use crate::edge::{EdgeId, EdgeSelection};
use crate::node::NodeId;

/// Name of the slice holding the [`ConversationState`].
pub const CONVERSATION_SLICE: &str = "conversation";

/// Where the conversation is and what the last message resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// The node the conversation currently sits on.
    pub current_node: Option<NodeId>,
    /// Id of the intent detected for the message in flight.
    pub intent_id: Option<String>,
    /// Edge selected for the message in flight. Cleared once the
    /// conversation moves.
    pub edge: Option<EdgeSelection>,
    /// Messages not understood since the last successful transition.
    pub misunderstood_count: u32,
}

impl ConversationState {
    /// A conversation positioned on `node`.
    #[must_use]
    pub fn at(node: NodeId) -> Self {
        Self {
            current_node: Some(node),
            ..Self::default()
        }
    }

    /// Returns the selected edge id, if an edge was chosen.
    #[must_use]
    pub fn edge_id(&self) -> Option<&EdgeId> {
        self.edge.as_ref().and_then(EdgeSelection::edge_id)
    }
}

/// Typed access to the conversation slice of a [`State`].
pub trait ConversationStateExt {
    /// Returns the conversation slice, if present.
    fn conversation(&self) -> Option<&ConversationState>;

    /// Returns the current node, if any.
    fn current_node(&self) -> Option<NodeId> {
        self.conversation().and_then(|c| c.current_node)
    }
}

impl ConversationStateExt for State {
    fn conversation(&self) -> Option<&ConversationState> {
        self.slice::<ConversationState>(CONVERSATION_SLICE)
    }
}

/// Conversation action types and constructors.
pub mod action {
    use colloquy_store::action::Action;

    use crate::edge::EdgeSelection;
    use crate::node::NodeId;

    /// A message arrived. Payload: the raw text (`String`).
    pub const MESSAGE_RECEIVED: &str = "colloquy/MESSAGE_RECEIVED";
    /// The detector classified the message. Payload: the intent id (`String`).
    pub const INTENT_UNDERSTANDING_SUCCEEDED: &str = "colloquy/INTENT_UNDERSTANDING_SUCCEEDED";
    /// The detector could not classify the message. No payload.
    pub const INTENT_UNDERSTANDING_FAILED: &str = "colloquy/INTENT_UNDERSTANDING_FAILED";
    /// The current node chose an edge. Payload: [`EdgeSelection`].
    pub const MAPPED_INTENT_TO_EDGE: &str = "colloquy/MAPPED_INTENT_TO_EDGE";
    /// The conversation moved to a node, consuming the recorded intent and
    /// edge. Payload: [`NodeId`].
    pub const NODE_PROCESSING_SUCCEEDED: &str = "colloquy/NODE_PROCESSING_SUCCEEDED";

    /// Builds a [`MESSAGE_RECEIVED`] action.
    #[must_use]
    pub fn message_received(text: impl Into<String>) -> Action {
        Action::with_payload(MESSAGE_RECEIVED, text.into())
    }

    /// Builds an [`INTENT_UNDERSTANDING_SUCCEEDED`] action.
    #[must_use]
    pub fn intent_understanding_succeeded(intent_id: impl Into<String>) -> Action {
        Action::with_payload(INTENT_UNDERSTANDING_SUCCEEDED, intent_id.into())
    }

    /// Builds an [`INTENT_UNDERSTANDING_FAILED`] action.
    #[must_use]
    pub fn intent_understanding_failed() -> Action {
        Action::new(INTENT_UNDERSTANDING_FAILED)
    }

    /// Builds a [`MAPPED_INTENT_TO_EDGE`] action.
    #[must_use]
    pub fn mapped_intent_to_edge(selection: EdgeSelection) -> Action {
        Action::with_payload(MAPPED_INTENT_TO_EDGE, selection)
    }

    /// Builds a [`NODE_PROCESSING_SUCCEEDED`] action.
    #[must_use]
    pub fn node_processing_succeeded(node: NodeId) -> Action {
        Action::with_payload(NODE_PROCESSING_SUCCEEDED, node)
    }
}

/// The reducer type managing [`CONVERSATION_SLICE`].
pub type ConversationReducer =
    SliceReducer<ConversationState, fn(&Action, &ConversationState) -> Option<ConversationState>>;

/// Returns the reducer for the conversation slice.
#[must_use]
pub fn conversation_reducer() -> ConversationReducer {
    SliceReducer::new(reduce_conversation as fn(&Action, &ConversationState) -> Option<ConversationState>)
}

/// Folds a conversation action into the slice.
///
/// Returns `None` when the action leaves the slice unchanged, including
/// for every action this reducer does not handle.
#[must_use]
pub fn reduce_conversation(act: &Action, state: &ConversationState) -> Option<ConversationState> {
    match act.action_type().as_str() {
        action::MESSAGE_RECEIVED => {
            if state.intent_id.is_none() && state.edge.is_none() {
                return None;
            }
            Some(ConversationState {
                intent_id: None,
                edge: None,
                ..state.clone()
            })
        }
        action::INTENT_UNDERSTANDING_SUCCEEDED => {
            let intent_id = payload::<String>(act)?;
            Some(ConversationState {
                intent_id: Some(intent_id.clone()),
                edge: None,
                ..state.clone()
            })
        }
        action::INTENT_UNDERSTANDING_FAILED => Some(ConversationState {
            misunderstood_count: state.misunderstood_count.saturating_add(1),
            ..state.clone()
        }),
        action::MAPPED_INTENT_TO_EDGE => {
            let selection = payload::<EdgeSelection>(act)?;
            Some(ConversationState {
                edge: Some(selection.clone()),
                ..state.clone()
            })
        }
        action::NODE_PROCESSING_SUCCEEDED => {
            let node = *payload::<NodeId>(act)?;
            Some(ConversationState {
                current_node: Some(node),
                intent_id: None,
                edge: None,
                misunderstood_count: 0,
            })
        }
        _ => None,
    }
}

fn payload<T: 'static>(act: &Action) -> Option<&T> {
    let payload = act.payload::<T>();
    if payload.is_none() {
        tracing::warn!(
            action = %act.action_type(),
            expected = core::any::type_name::<T>(),
            "conversation action without expected payload; ignoring"
        );
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_received_clears_last_resolution() {
        let state = ConversationState {
            current_node: Some(NodeId::new(1)),
            intent_id: Some("YES".to_string()),
            edge: Some(EdgeSelection::Edge(EdgeId::new("YES"))),
            misunderstood_count: 2,
        };

        let next = reduce_conversation(&action::message_received("hi"), &state).unwrap();
        assert_eq!(next.intent_id, None);
        assert_eq!(next.edge, None);
        assert_eq!(next.current_node, Some(NodeId::new(1)));
        assert_eq!(next.misunderstood_count, 2);
    }

    #[test]
    fn message_received_on_clean_slice_is_a_no_op() {
        let state = ConversationState::at(NodeId::new(1));
        assert!(reduce_conversation(&action::message_received("hi"), &state).is_none());
    }

    #[test]
    fn understanding_failures_accumulate_until_a_transition() {
        let mut state = ConversationState::at(NodeId::new(1));
        for _ in 0..3 {
            state = reduce_conversation(&action::intent_understanding_failed(), &state).unwrap();
        }
        assert_eq!(state.misunderstood_count, 3);

        let state = reduce_conversation(&action::node_processing_succeeded(NodeId::new(4)), &state).unwrap();
        assert_eq!(state.misunderstood_count, 0);
        assert_eq!(state.current_node, Some(NodeId::new(4)));
    }

    #[test]
    fn transition_clears_the_resolution_it_consumed() {
        let state = ConversationState {
            current_node: Some(NodeId::new(1)),
            intent_id: Some("YES".to_string()),
            edge: Some(EdgeSelection::Indexed {
                index: 0,
                id: EdgeId::new("YES"),
            }),
            misunderstood_count: 1,
        };

        let next = reduce_conversation(&action::node_processing_succeeded(NodeId::new(2)), &state).unwrap();

        assert_eq!(next, ConversationState::at(NodeId::new(2)));
        assert_eq!(next.edge_id(), None);
    }

    #[test]
    fn intent_and_edge_are_recorded() {
        let state = ConversationState::default();
        let state = reduce_conversation(&action::intent_understanding_succeeded("YES"), &state).unwrap();
        assert_eq!(state.intent_id.as_deref(), Some("YES"));

        let state = reduce_conversation(
            &action::mapped_intent_to_edge(EdgeSelection::Edge(EdgeId::new("YES"))),
            &state,
        )
        .unwrap();
        assert_eq!(state.edge_id(), Some(&EdgeId::new("YES")));
    }

    #[test]
    fn missing_payload_and_foreign_actions_are_ignored() {
        let state = ConversationState::default();
        assert!(reduce_conversation(&Action::new(action::MAPPED_INTENT_TO_EDGE), &state).is_none());
        assert!(reduce_conversation(&Action::new("SET_ANSWER"), &state).is_none());
    }

    #[test]
    fn state_extension_reads_the_slice() {
        let state = State::new().with_slice(CONVERSATION_SLICE, ConversationState::at(NodeId::new(2)));
        assert_eq!(state.current_node(), Some(NodeId::new(2)));
        assert_eq!(State::new().conversation(), None);
    }
}

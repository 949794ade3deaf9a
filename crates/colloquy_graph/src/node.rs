//! Node types for conversation graphs.
//!
//! A node is one turn of the dialog. It owns its outbound edges in
//! declaration order and knows how to map a detected intent onto one of
//! them.

use core::fmt;

use colloquy_store::state::State;
use serde_json::Value;

use crate::edge::{Edge, EdgeId, EdgeMapping};
use crate::intent::Intent;

/// Unique identifier for a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Creates a new node ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Errors raised while mapping an intent to an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// An effect needed a slot the intent does not carry.
    MissingSlot {
        /// The intent id.
        intent: String,
        /// The missing slot name.
        slot: String,
    },
    /// An edge's effect failed.
    Effect {
        /// The edge whose effect failed.
        edge: EdgeId,
        /// The underlying failure.
        message: String,
    },
    /// A custom mapping failed.
    Failed(String),
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingError::MissingSlot { intent, slot } => {
                write!(f, "intent '{intent}' has no slot '{slot}'")
            }
            MappingError::Effect { edge, message } => {
                write!(f, "effect of edge '{edge}' failed: {message}")
            }
            MappingError::Failed(msg) => write!(f, "mapping failed: {msg}"),
        }
    }
}

impl core::error::Error for MappingError {}

/// Maps an intent onto one of a node's edges.
///
/// Plain nodes use [`first_eligible_edge`]. A [`CustomNode`] carries its own
/// mapper, which may inspect any slice of the state.
pub trait EdgeMapper: Send + Sync {
    /// Chooses an edge among `edges` for `intent`.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the mapping cannot be completed.
    fn map_intent_to_edge(
        &self,
        edges: &[Edge],
        intent: &Intent,
        state: &State,
    ) -> Result<EdgeMapping, MappingError>;
}

impl<F> EdgeMapper for F
where
    F: Fn(&[Edge], &Intent, &State) -> Result<EdgeMapping, MappingError> + Send + Sync,
{
    fn map_intent_to_edge(
        &self,
        edges: &[Edge],
        intent: &Intent,
        state: &State,
    ) -> Result<EdgeMapping, MappingError> {
        self(edges, intent, state)
    }
}

/// Type alias for boxed edge mappers stored in custom nodes.
pub type BoxedEdgeMapper = Box<dyn EdgeMapper>;

/// The default mapping: the first edge in declaration order that accepts
/// the intent is selected, and its effect, if any, is evaluated.
///
/// # Errors
///
/// Returns [`MappingError::Effect`] if the selected edge's effect fails.
pub fn first_eligible_edge(
    edges: &[Edge],
    intent: &Intent,
    state: &State,
) -> Result<EdgeMapping, MappingError> {
    let Some((index, edge)) = edges
        .iter()
        .enumerate()
        .find(|(_, edge)| edge.accepts(intent, state))
    else {
        tracing::debug!(intent = intent.id(), "no eligible edge");
        return Ok(EdgeMapping::unmatched());
    };

    let mut mapping = EdgeMapping::at(index, edge.id.clone());
    match edge.apply_effect(intent, state) {
        Ok(Some(action)) => mapping = mapping.with_effect(action),
        Ok(None) => {}
        Err(err @ MappingError::Effect { .. }) => return Err(err),
        Err(err) => {
            return Err(MappingError::Effect {
                edge: edge.id.clone(),
                message: err.to_string(),
            });
        }
    }
    Ok(mapping)
}

/// A node in the conversation graph.
#[derive(Debug)]
pub enum Node {
    /// A plain conversation node.
    Conversation(ConversationNode),
    /// A node that also carries content and suggested replies.
    ResponseSuggesting(ResponseSuggestingNode),
    /// A node with a user-supplied mapping.
    Custom(CustomNode),
}

impl Node {
    /// Returns the node's ID.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.base().id
    }

    /// Returns the outbound edges in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.base().edges
    }

    /// Returns the presentation metadata.
    #[must_use]
    pub fn metadata(&self) -> &Value {
        &self.base().metadata
    }

    /// Maps `intent` onto one of this node's edges.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if an effect or a custom mapper fails.
    pub fn map_intent_to_edge(&self, intent: &Intent, state: &State) -> Result<EdgeMapping, MappingError> {
        match self {
            Node::Conversation(n) => first_eligible_edge(&n.edges, intent, state),
            Node::ResponseSuggesting(n) => first_eligible_edge(&n.node.edges, intent, state),
            Node::Custom(n) => n.mapper.map_intent_to_edge(&n.node.edges, intent, state),
        }
    }

    pub(crate) fn push_edge(&mut self, edge: Edge) {
        self.base_mut().edges.push(edge);
    }

    fn base(&self) -> &ConversationNode {
        match self {
            Node::Conversation(n) => n,
            Node::ResponseSuggesting(n) => &n.node,
            Node::Custom(n) => &n.node,
        }
    }

    fn base_mut(&mut self) -> &mut ConversationNode {
        match self {
            Node::Conversation(n) => n,
            Node::ResponseSuggesting(n) => &mut n.node,
            Node::Custom(n) => &mut n.node,
        }
    }
}

impl From<ConversationNode> for Node {
    fn from(node: ConversationNode) -> Self {
        Node::Conversation(node)
    }
}

impl From<ResponseSuggestingNode> for Node {
    fn from(node: ResponseSuggestingNode) -> Self {
        Node::ResponseSuggesting(node)
    }
}

impl From<CustomNode> for Node {
    fn from(node: CustomNode) -> Self {
        Node::Custom(node)
    }
}

/// A plain node: id, outbound edges and opaque metadata.
#[derive(Debug)]
pub struct ConversationNode {
    /// Unique identifier for this node.
    pub id: NodeId,
    /// Outbound edges in declaration order.
    pub edges: Vec<Edge>,
    /// Presentation metadata, never read by the engine.
    pub metadata: Value,
}

impl ConversationNode {
    /// Creates a node without edges or metadata.
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            edges: Vec::new(),
            metadata: Value::Null,
        }
    }

    /// Appends an outbound edge.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// How a node's content should be rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    /// Plain text.
    #[default]
    Text,
    /// Markdown.
    Markdown,
    /// An image reference.
    Image,
}

/// A button offered to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeButton {
    /// Text shown on the button.
    pub label: String,
    /// Text sent back when pressed.
    pub value: String,
}

impl NodeButton {
    /// Creates a button.
    #[must_use]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// A node carrying content to show and replies to suggest.
///
/// Suggestions are presentation only: nothing checks that they correspond
/// to an outbound edge.
#[derive(Debug)]
pub struct ResponseSuggestingNode {
    /// The underlying plain node.
    pub node: ConversationNode,
    /// Content shown when the node is reached.
    pub content: String,
    /// How `content` is rendered.
    pub content_type: ContentType,
    /// Suggested free-text replies.
    pub suggested_responses: Vec<String>,
    /// Buttons offered to the user.
    pub buttons: Vec<NodeButton>,
}

impl ResponseSuggestingNode {
    /// Creates a node with text content.
    #[must_use]
    pub fn new(id: NodeId, content: impl Into<String>) -> Self {
        Self {
            node: ConversationNode::new(id),
            content: content.into(),
            content_type: ContentType::Text,
            suggested_responses: Vec::new(),
            buttons: Vec::new(),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Adds a suggested reply.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggested_responses.push(suggestion.into());
        self
    }

    /// Adds a button.
    #[must_use]
    pub fn with_button(mut self, button: NodeButton) -> Self {
        self.buttons.push(button);
        self
    }

    /// Appends an outbound edge.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.node.edges.push(edge);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.node.metadata = metadata;
        self
    }
}

/// A node whose intent mapping is supplied by the user.
pub struct CustomNode {
    /// The underlying plain node.
    pub node: ConversationNode,
    /// The mapping used instead of [`first_eligible_edge`].
    pub mapper: BoxedEdgeMapper,
}

impl CustomNode {
    /// Creates a custom node from any [`EdgeMapper`].
    #[must_use]
    pub fn new<M: EdgeMapper + 'static>(id: NodeId, mapper: M) -> Self {
        Self {
            node: ConversationNode::new(id),
            mapper: Box::new(mapper),
        }
    }

    /// Appends an outbound edge.
    #[must_use]
    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.node.edges.push(edge);
        self
    }
}

impl fmt::Debug for CustomNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomNode")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

//! The conversation graph.
//!
//! A [`Graph`] is an arena of nodes addressed by [`NodeId`]. Edges store
//! target ids rather than references, so cycles are ordinary topology and
//! edges may point at nodes that are added later.
//!
//! The graph is built once and is read-only afterwards; engines share it as
//! an `Arc<Graph>`.
//!
//! # Example
//!
//! ```
//! use colloquy_graph::edge::Edge;
//! use colloquy_graph::graph::Graph;
//! use colloquy_graph::node::{ConversationNode, NodeId};
//!
//! let mut graph = Graph::new();
//! graph
//!     .add_node(ConversationNode::new(NodeId::new(1)).with_edge(Edge::new("NEXT", NodeId::new(2))))
//!     .unwrap()
//!     .add_node(ConversationNode::new(NodeId::new(2)).with_edge(Edge::new("BACK", NodeId::new(1))))
//!     .unwrap();
//!
//! assert_eq!(graph.len(), 2);
//! assert!(graph.validate().is_ok());
//! ```

use core::fmt;

use hashbrown::HashMap;

use crate::edge::{Edge, EdgeId};
use crate::node::{Node, NodeId};

/// Errors raised while building a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id is already in the graph.
    DuplicateNode(NodeId),
    /// No node with this id is in the graph.
    NodeNotFound(NodeId),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::DuplicateNode(id) => write!(f, "duplicate node: {id}"),
            GraphError::NodeNotFound(id) => write!(f, "node not found: {id}"),
        }
    }
}

impl core::error::Error for GraphError {}

/// Structural problems reported by [`Graph::validate`].
///
/// Validation is optional: the engine checks targets lazily, when it
/// traverses an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An edge's target node doesn't exist.
    InvalidEdgeTarget {
        /// The node owning the edge.
        node: NodeId,
        /// The edge ID.
        edge: EdgeId,
        /// The missing target.
        target: NodeId,
    },
    /// A fallback's target node doesn't exist.
    InvalidFallbackTarget {
        /// The intent the fallback is registered for.
        intent: String,
        /// The missing target.
        target: NodeId,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidEdgeTarget { node, edge, target } => {
                write!(f, "edge '{edge}' of {node} targets missing node {target}")
            }
            ValidationError::InvalidFallbackTarget { intent, target } => {
                write!(f, "fallback for intent '{intent}' targets missing node {target}")
            }
        }
    }
}

impl core::error::Error for ValidationError {}

/// Mapping from node ids to nodes.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<NodeId, Node>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateNode`] if a node with the same id is
    /// already present. The graph is left unchanged.
    pub fn add_node(&mut self, node: impl Into<Node>) -> Result<&mut Self, GraphError> {
        let node = node.into();
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.nodes.insert(id, node);
        Ok(self)
    }

    /// Appends an outbound edge to an existing node, after its current
    /// edges.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if `from` is not in the graph.
    pub fn add_edge(&mut self, from: NodeId, edge: Edge) -> Result<&mut Self, GraphError> {
        let node = self
            .nodes
            .get_mut(&from)
            .ok_or(GraphError::NodeNotFound(from))?;
        node.push_edge(edge);
        Ok(self)
    }

    /// Returns the node with the given id.
    #[must_use]
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Returns true if the graph holds a node with the given id.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Returns all node ids in ascending order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns an iterator over all nodes, in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks that every edge targets a node in the graph.
    ///
    /// # Errors
    ///
    /// Returns every dangling edge, ordered by source node.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        for id in self.node_ids() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            for edge in node.edges() {
                if !self.contains(edge.target) {
                    errors.push(ValidationError::InvalidEdgeTarget {
                        node: id,
                        edge: edge.id.clone(),
                        target: edge.target,
                    });
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ConversationNode;

    fn node(id: u32) -> ConversationNode {
        ConversationNode::new(NodeId::new(id))
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut graph = Graph::new();
        graph.add_node(node(1)).unwrap();

        let err = graph.add_node(node(1).with_edge(Edge::new("A", NodeId::new(2)))).unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode(NodeId::new(1)));
        assert!(graph.get_node(NodeId::new(1)).unwrap().edges().is_empty());
    }

    #[test]
    fn add_edge_appends_in_order() {
        let mut graph = Graph::new();
        graph
            .add_node(node(1).with_edge(Edge::new("A", NodeId::new(2))))
            .unwrap()
            .add_edge(NodeId::new(1), Edge::new("B", NodeId::new(3)))
            .unwrap();

        let ids: Vec<_> = graph
            .get_node(NodeId::new(1))
            .unwrap()
            .edges()
            .iter()
            .map(|edge| edge.id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);

        let err = graph
            .add_edge(NodeId::new(9), Edge::new("C", NodeId::new(1)))
            .unwrap_err();
        assert_eq!(err.to_string(), "node not found: node_9");
    }

    #[test]
    fn cycles_are_valid() {
        let mut graph = Graph::new();
        graph
            .add_node(node(1).with_edge(Edge::new("A", NodeId::new(1))))
            .unwrap();
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn validate_reports_dangling_targets() {
        let mut graph = Graph::new();
        graph
            .add_node(node(2).with_edge(Edge::new("X", NodeId::new(7))))
            .unwrap()
            .add_node(node(1).with_edge(Edge::new("Y", NodeId::new(8))))
            .unwrap();

        let errors = graph.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].to_string(),
            "edge 'Y' of node_1 targets missing node node_8"
        );
        assert_eq!(
            errors[1],
            ValidationError::InvalidEdgeTarget {
                node: NodeId::new(2),
                edge: EdgeId::new("X"),
                target: NodeId::new(7),
            }
        );
    }

    #[test]
    fn node_ids_are_sorted() {
        let mut graph = Graph::new();
        for id in [5, 1, 3] {
            graph.add_node(node(id)).unwrap();
        }
        assert_eq!(
            graph.node_ids(),
            vec![NodeId::new(1), NodeId::new(3), NodeId::new(5)]
        );
        assert_eq!(graph.nodes().count(), 3);
        assert!(!graph.is_empty());
    }
}

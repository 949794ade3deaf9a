//! Edge types for conversation graphs.
//!
//! Edges are the labelled, directed transitions between nodes. An edge is
//! selected when it is activated by the detected intent and its validator,
//! if any, accepts the intent.

use core::fmt;
use std::sync::Arc;

use colloquy_store::action::Action;
use colloquy_store::state::State;

use crate::intent::Intent;
use crate::node::{MappingError, NodeId};
use crate::validator::{BoxedEffect, BoxedValidator, ErasedEffect, ErasedValidator};

/// Identifier of an edge.
///
/// An edge's id defaults to the id of the intent that activates it. The
/// default mapping records the chosen edge's position, so edges sharing an id
/// stay distinct there; a selection by id alone resolves to the first edge
/// carrying it. Internally uses `Arc<str>` for cheap cloning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeId(Arc<str>);

impl EdgeId {
    /// Creates an edge ID from a string value.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EdgeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EdgeId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl PartialEq<str> for EdgeId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

/// A directed transition to another node.
///
/// The target is not checked when the edge is built: it may name a node that
/// is added to the graph later. Traversal fails if the target is still
/// missing by then.
pub struct Edge {
    /// Identifier recorded when the edge is selected.
    pub id: EdgeId,
    /// Id of the intent that activates this edge.
    pub intent: String,
    /// The node this edge leads to.
    pub target: NodeId,
    /// Decides whether the edge is eligible. Absent means always eligible.
    pub validator: Option<BoxedValidator>,
    /// Produces an action once the edge is chosen.
    pub effect: Option<BoxedEffect>,
}

impl Edge {
    /// Creates an edge activated by `intent`, identified by the intent id,
    /// without validator or effect.
    #[must_use]
    pub fn new(intent: impl Into<String>, target: NodeId) -> Self {
        let intent = intent.into();
        Self {
            id: EdgeId::new(intent.as_str()),
            intent,
            target,
            validator: None,
            effect: None,
        }
    }

    /// Overrides the edge id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the validator.
    #[must_use]
    pub fn with_validator<V: ErasedValidator + 'static>(mut self, validator: V) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Sets the side effect.
    #[must_use]
    pub fn with_effect<E: ErasedEffect + 'static>(mut self, effect: E) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    /// Returns true if this edge may be taken for `intent`.
    ///
    /// The edge must be activated by the intent and the validator, if any,
    /// must accept it.
    #[must_use]
    pub fn accepts(&self, intent: &Intent, state: &State) -> bool {
        self.intent == intent.id()
            && self
                .validator
                .as_ref()
                .is_none_or(|validator| validator.validate(intent, state))
    }

    /// Evaluates the side effect, if any.
    ///
    /// # Errors
    ///
    /// Returns the effect's [`MappingError`].
    pub fn apply_effect(&self, intent: &Intent, state: &State) -> Result<Option<Action>, MappingError> {
        self.effect
            .as_ref()
            .map(|effect| effect.apply(intent, state))
            .transpose()
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("id", &self.id)
            .field("intent", &self.intent)
            .field("target", &self.target)
            .field("validator", &self.validator)
            .field("effect", &self.effect)
            .finish()
    }
}

/// The outcome of mapping an intent at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeSelection {
    /// The node chose an edge by id. Routing follows the first outbound
    /// edge carrying this id.
    Edge(EdgeId),
    /// The node chose the outbound edge at `index`, whose id is `id`.
    /// Edges sharing an id stay distinct.
    Indexed {
        /// Position of the edge in declaration order.
        index: usize,
        /// The chosen edge's id.
        id: EdgeId,
    },
    /// No outbound edge was eligible; only fallback routing applies.
    Unmatched,
}

impl EdgeSelection {
    /// Returns the selected edge id, if any.
    #[must_use]
    pub fn edge_id(&self) -> Option<&EdgeId> {
        match self {
            EdgeSelection::Edge(id) | EdgeSelection::Indexed { id, .. } => Some(id),
            EdgeSelection::Unmatched => None,
        }
    }

    /// Finds the selected edge among `edges`.
    ///
    /// An indexed selection whose position no longer holds an edge with the
    /// recorded id is looked up by id instead.
    #[must_use]
    pub fn resolve<'a>(&self, edges: &'a [Edge]) -> Option<&'a Edge> {
        let by_id = |id: &EdgeId| edges.iter().find(|edge| edge.id == *id);
        match self {
            EdgeSelection::Edge(id) => by_id(id),
            EdgeSelection::Indexed { index, id } => edges
                .get(*index)
                .filter(|edge| edge.id == *id)
                .or_else(|| by_id(id)),
            EdgeSelection::Unmatched => None,
        }
    }
}

impl fmt::Display for EdgeSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeSelection::Edge(id) => write!(f, "{id}"),
            EdgeSelection::Indexed { index, id } => write!(f, "{id}#{index}"),
            EdgeSelection::Unmatched => f.write_str("<unmatched>"),
        }
    }
}

/// What a node's intent mapping produced: the edge selection and the
/// action emitted by the chosen edge's effect.
#[derive(Debug, Clone)]
pub struct EdgeMapping {
    /// The selected edge, or [`EdgeSelection::Unmatched`].
    pub selection: EdgeSelection,
    /// Action to dispatch right after the selection.
    pub effect: Option<Action>,
}

impl EdgeMapping {
    /// Selects `edge` without an effect action.
    #[must_use]
    pub fn edge(edge: impl Into<EdgeId>) -> Self {
        Self {
            selection: EdgeSelection::Edge(edge.into()),
            effect: None,
        }
    }

    /// Selects the edge at `index` without an effect action.
    #[must_use]
    pub fn at(index: usize, edge: impl Into<EdgeId>) -> Self {
        Self {
            selection: EdgeSelection::Indexed {
                index,
                id: edge.into(),
            },
            effect: None,
        }
    }

    /// A mapping with no eligible edge.
    #[must_use]
    pub fn unmatched() -> Self {
        Self {
            selection: EdgeSelection::Unmatched,
            effect: None,
        }
    }

    /// Attaches an effect action.
    #[must_use]
    pub fn with_effect(mut self, effect: Action) -> Self {
        self.effect = Some(effect);
        self
    }
}

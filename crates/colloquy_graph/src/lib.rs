//! Conversation graphs and the conversation engine for colloquy (Layer 2).
//!
//! A conversation is a walk over a directed [`Graph`](graph::Graph) of
//! nodes. Each user message is classified into an
//! [`Intent`](intent::Intent), the current node maps the intent onto one of
//! its outbound edges, and the engine moves to that edge's target. Every
//! step is recorded by dispatching actions to a `colloquy_store` store.
//!
//! # Core Concepts
//!
//! - [`Node`](node::Node) - One dialog turn with ordered outbound edges
//! - [`Edge`](edge::Edge) - Transition matched by intent id, optionally validated and paired with an effect
//! - [`Graph`](graph::Graph) - Arena of nodes addressed by [`NodeId`](node::NodeId)
//! - [`IntentDetector`](intent::IntentDetector) - External text classifier
//! - [`MappingScheduler`](scheduler::MappingScheduler) - Where node mappings run
//! - [`ConversationEngine`](engine::ConversationEngine) - The per-message pipeline
//!
//! # Architecture
//!
//! - **Layer 1** (`colloquy_store`): actions, state, reducers, middleware
//! - **Layer 2** (`colloquy_graph`): conversation graph and engine (this crate)

/// Conversation slice, actions and reducer.
pub mod conversation;

/// Edge types.
pub mod edge;

/// The conversation engine.
pub mod engine;

/// Graph structure.
pub mod graph;

/// Intents and intent detection.
pub mod intent;

/// Node types.
pub mod node;

/// Mapping schedulers.
pub mod scheduler;

/// Edge validators and effects.
pub mod validator;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::conversation::{
        CONVERSATION_SLICE, ConversationState, ConversationStateExt, action, conversation_reducer,
    };
    pub use crate::edge::{Edge, EdgeId, EdgeMapping, EdgeSelection};
    pub use crate::engine::{
        ConversationEngine, ConversationEngineBuilder, ConversationStructureError, ErrorCode,
        MessageHandlingResult,
    };
    pub use crate::graph::{Graph, GraphError, ValidationError};
    pub use crate::intent::{DetectionError, Intent, IntentDetector};
    pub use crate::node::{
        ContentType, ConversationNode, CustomNode, EdgeMapper, MappingError, Node, NodeButton,
        NodeId, ResponseSuggestingNode, first_eligible_edge,
    };
    pub use crate::scheduler::{InlineScheduler, MappingJob, MappingScheduler, SchedulerError, WorkerPool};
    pub use crate::validator::{
        Effect, ErasedEffect, ErasedValidator, SlotEffect, SlotValidator, Validator,
    };
}

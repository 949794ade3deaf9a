//! The conversation engine.
//!
//! A [`ConversationEngine`] drives one conversation. For every incoming
//! message it:
//!
//! 1. looks up the current node,
//! 2. dispatches `MESSAGE_RECEIVED`,
//! 3. awaits the [`IntentDetector`] and dispatches the understanding outcome,
//! 4. maps the intent onto an outbound edge on its [`MappingScheduler`] and
//!    dispatches the selection, followed by the edge's effect action,
//! 5. finds the next node, falling back to the fallback table keyed by
//!    intent id,
//! 6. dispatches `NODE_PROCESSING_SUCCEEDED`.
//!
//! Every state change goes through the engine's [`Store`]; the graph is
//! never modified. Actions dispatched before a failure are kept.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use colloquy_graph::prelude::*;
//! use colloquy_store::deferred::BoxFuture;
//!
//! struct Echo;
//!
//! impl IntentDetector for Echo {
//!     fn detect_intent<'a>(
//!         &'a self,
//!         text: &'a str,
//!     ) -> BoxFuture<'a, Result<Option<Intent>, DetectionError>> {
//!         Box::pin(async move { Ok(Some(Intent::new(text.to_uppercase()))) })
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut graph = Graph::new();
//! graph
//!     .add_node(ConversationNode::new(NodeId::new(1)).with_edge(Edge::new("NEXT", NodeId::new(2))))
//!     .unwrap()
//!     .add_node(ConversationNode::new(NodeId::new(2)))
//!     .unwrap();
//!
//! let mut engine = ConversationEngine::builder(Arc::new(graph), Echo)
//!     .starting_at(NodeId::new(1))
//!     .build();
//!
//! let result = engine.handle_incoming_message("next").await.unwrap();
//! assert!(result.ok);
//! assert_eq!(engine.get_state().current_node(), Some(NodeId::new(2)));
//! # });
//! ```

use core::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use colloquy_store::action::Action;
use colloquy_store::deferred::describe_panic;
use colloquy_store::middleware::{BoxedMiddleware, Middleware};
use colloquy_store::reducer::{CombinedReducer, ErasedSliceReducer};
use colloquy_store::state::State;
use colloquy_store::store::{Store, StoreError};
use futures::FutureExt;
use hashbrown::HashMap;
use tracing::Instrument;

use crate::conversation::{
    CONVERSATION_SLICE, ConversationState, ConversationStateExt, action, conversation_reducer,
};
use crate::edge::EdgeMapping;
use crate::graph::{Graph, ValidationError};
use crate::intent::{Intent, IntentDetector};
use crate::node::{MappingError, NodeId};
use crate::scheduler::{InlineScheduler, MappingJob, MappingScheduler, SchedulerError};

/// Why a message could not be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The detector could not classify the message.
    IntentUnderstandingFailed,
    /// Detection, mapping or dispatch failed while processing the intent.
    IntentProcessingFailed,
}

impl ErrorCode {
    /// Returns the code's wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IntentUnderstandingFailed => "INTENT_UNDERSTANDING_FAILED",
            ErrorCode::IntentProcessingFailed => "INTENT_PROCESSING_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`ConversationEngine::handle_incoming_message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandlingResult {
    /// True if the conversation moved to a node.
    pub ok: bool,
    /// Set when `ok` is false.
    pub error_code: Option<ErrorCode>,
    /// Human readable detail for `error_code`.
    pub error_message: Option<String>,
    /// The node the conversation moved to, when `ok` is true.
    pub node: Option<NodeId>,
}

impl MessageHandlingResult {
    /// A successful transition to `node`.
    #[must_use]
    pub fn success(node: NodeId) -> Self {
        Self {
            ok: true,
            error_code: None,
            error_message: None,
            node: Some(node),
        }
    }

    /// A failed message.
    #[must_use]
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_code: Some(code),
            error_message: Some(message.into()),
            node: None,
        }
    }

    fn understanding_failed() -> Self {
        Self::failure(
            ErrorCode::IntentUnderstandingFailed,
            "the message could not be understood",
        )
    }

    fn processing_failed(err: impl fmt::Display) -> Self {
        Self::failure(ErrorCode::IntentProcessingFailed, err.to_string())
    }
}

/// Fatal inconsistencies between the graph, the fallbacks and the
/// conversation state.
///
/// These are authoring errors rather than bad input, so they are returned
/// as `Err` instead of a failed [`MessageHandlingResult`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationStructureError {
    /// No edge selection was recorded before the next node was looked up.
    MissingEdgeId,
    /// No outbound edge of `node` matched and no fallback exists for `intent`.
    NoMatchingEndNode {
        /// The current node.
        node: NodeId,
        /// The detected intent id.
        intent: String,
    },
    /// There is no current node and no fallback exists for `intent`.
    NoFallback {
        /// The detected intent id.
        intent: String,
    },
    /// An edge or fallback targets a node that is not in the graph.
    MissingNode(NodeId),
}

impl fmt::Display for ConversationStructureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStructureError::MissingEdgeId => {
                write!(f, "no edge selection recorded for the current message")
            }
            ConversationStructureError::NoMatchingEndNode { node, intent } => {
                write!(f, "no edge of {node} and no fallback matches intent '{intent}'")
            }
            ConversationStructureError::NoFallback { intent } => {
                write!(f, "no current node and no fallback for intent '{intent}'")
            }
            ConversationStructureError::MissingNode(id) => {
                write!(f, "target node not found in graph: {id}")
            }
        }
    }
}

impl core::error::Error for ConversationStructureError {}

/// Builder for [`ConversationEngine`].
pub struct ConversationEngineBuilder {
    graph: Arc<Graph>,
    detector: Arc<dyn IntentDetector>,
    initial_state: State,
    reducers: CombinedReducer,
    middleware: Vec<BoxedMiddleware>,
    scheduler: Arc<dyn MappingScheduler>,
    fallbacks: HashMap<String, NodeId>,
}

impl ConversationEngineBuilder {
    /// Sets the initial state.
    #[must_use]
    pub fn with_initial_state(mut self, state: State) -> Self {
        self.initial_state = state;
        self
    }

    /// Places the conversation on `node` in the initial state.
    #[must_use]
    pub fn starting_at(mut self, node: NodeId) -> Self {
        self.initial_state = self
            .initial_state
            .with_slice(CONVERSATION_SLICE, ConversationState::at(node));
        self
    }

    /// Adds a reducer for the slice `name`.
    ///
    /// The conversation slice is always managed by the engine's own reducer.
    #[must_use]
    pub fn with_reducer<R>(mut self, name: &str, reducer: R) -> Self
    where
        R: ErasedSliceReducer + 'static,
    {
        if name == CONVERSATION_SLICE {
            tracing::warn!(slice = name, "reserved slice name; reducer ignored");
            return self;
        }
        self.reducers.insert(name, reducer);
        self
    }

    /// Appends a middleware to the store's chain.
    #[must_use]
    pub fn with_middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.middleware.push(Box::new(middleware));
        self
    }

    /// Sets the scheduler running node mappings.
    #[must_use]
    pub fn with_scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: MappingScheduler + 'static,
    {
        self.scheduler = Arc::new(scheduler);
        self
    }

    /// Registers a fallback target for `intent_id`.
    #[must_use]
    pub fn with_fallback(mut self, intent_id: impl Into<String>, node: NodeId) -> Self {
        self.fallbacks.insert(intent_id.into(), node);
        self
    }

    /// Builds the engine. The store runs its initialisation action here.
    #[must_use]
    pub fn build(self) -> ConversationEngine {
        let reducers = self
            .reducers
            .with(CONVERSATION_SLICE, conversation_reducer());
        let mut store = Store::new(reducers, self.initial_state);
        for middleware in self.middleware {
            store.add_boxed_middleware(middleware);
        }

        ConversationEngine {
            graph: self.graph,
            detector: self.detector,
            scheduler: self.scheduler,
            store,
            fallbacks: self.fallbacks,
        }
    }
}

impl fmt::Debug for ConversationEngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationEngineBuilder")
            .field("graph", &self.graph)
            .field("reducers", &self.reducers)
            .field("middleware", &self.middleware)
            .field("scheduler", &self.scheduler)
            .field("fallbacks", &self.fallbacks)
            .finish_non_exhaustive()
    }
}

/// Drives one conversation over a shared graph.
///
/// Each engine owns its store, so `&mut self` on
/// [`handle_incoming_message`](Self::handle_incoming_message) guarantees that
/// messages of one conversation are processed one at a time.
pub struct ConversationEngine {
    graph: Arc<Graph>,
    detector: Arc<dyn IntentDetector>,
    scheduler: Arc<dyn MappingScheduler>,
    store: Store,
    fallbacks: HashMap<String, NodeId>,
}

impl ConversationEngine {
    /// Starts building an engine over `graph` using `detector`.
    ///
    /// Mappings run on an [`InlineScheduler`] unless another scheduler is
    /// set.
    #[must_use]
    pub fn builder<D>(graph: Arc<Graph>, detector: D) -> ConversationEngineBuilder
    where
        D: IntentDetector + 'static,
    {
        ConversationEngineBuilder {
            graph,
            detector: Arc::new(detector),
            initial_state: State::new(),
            reducers: CombinedReducer::new(),
            middleware: Vec::new(),
            scheduler: Arc::new(InlineScheduler),
            fallbacks: HashMap::new(),
        }
    }

    /// Returns the shared graph.
    #[must_use]
    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Returns the current state snapshot.
    #[must_use]
    pub fn get_state(&self) -> State {
        self.store.get_state()
    }

    /// Dispatches a domain action through the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a middleware aborts the dispatch.
    pub fn dispatch(&mut self, action: Action) -> Result<State, StoreError> {
        self.store.dispatch(action)
    }

    /// Routes `intent_id` to `node` when the current node has no matching
    /// edge. Returns the previously registered target, if any.
    pub fn register_fallback(&mut self, intent_id: impl Into<String>, node: NodeId) -> Option<NodeId> {
        self.fallbacks.insert(intent_id.into(), node)
    }

    /// Returns the fallback target for `intent_id`, if any.
    #[must_use]
    pub fn fallback(&self, intent_id: &str) -> Option<NodeId> {
        self.fallbacks.get(intent_id).copied()
    }

    /// Checks the graph's edges and every fallback target.
    ///
    /// # Errors
    ///
    /// Returns every dangling edge and fallback.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.graph.validate().err().unwrap_or_default();

        let mut fallbacks: Vec<_> = self.fallbacks.iter().collect();
        fallbacks.sort_unstable();
        for (intent, &target) in fallbacks {
            if !self.graph.contains(target) {
                errors.push(ValidationError::InvalidFallbackTarget {
                    intent: intent.clone(),
                    target,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Processes one user message.
    ///
    /// Input-driven failures (unclassifiable text, failing detectors,
    /// effects or middleware) are reported through the returned
    /// [`MessageHandlingResult`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConversationStructureError`] if the graph and fallbacks
    /// offer no valid next node.
    pub async fn handle_incoming_message(
        &mut self,
        text: &str,
    ) -> Result<MessageHandlingResult, ConversationStructureError> {
        let current_node = self
            .store
            .get_state()
            .current_node()
            .filter(|id| self.graph.contains(*id));
        let span = tracing::info_span!(
            "handle_message",
            node = current_node.map(tracing::field::display),
        );

        async move {
            let result = self.process(text, current_node).await;
            match &result {
                Ok(outcome) if outcome.ok => {
                    tracing::debug!(next = ?outcome.node, "message handled");
                }
                Ok(outcome) => {
                    tracing::debug!(
                        code = ?outcome.error_code,
                        error = outcome.error_message.as_deref().unwrap_or_default(),
                        "message not handled"
                    );
                }
                Err(err) => tracing::error!(error = %err, "conversation structure fault"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process(
        &mut self,
        text: &str,
        current_node: Option<NodeId>,
    ) -> Result<MessageHandlingResult, ConversationStructureError> {
        if let Err(err) = self.store.dispatch(action::message_received(text)) {
            return Ok(MessageHandlingResult::processing_failed(err));
        }

        tracing::trace!(phase = "awaiting_intent");
        let detected = AssertUnwindSafe(self.detector.detect_intent(text))
            .catch_unwind()
            .await;
        let intent = match detected {
            Ok(Ok(Some(intent))) => intent,
            Ok(Ok(None)) => {
                tracing::debug!("intent not understood");
                if let Err(err) = self.store.dispatch(action::intent_understanding_failed()) {
                    return Ok(MessageHandlingResult::processing_failed(err));
                }
                return Ok(MessageHandlingResult::understanding_failed());
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "intent detector failed");
                return Ok(MessageHandlingResult::processing_failed(err));
            }
            Err(panic) => {
                let message = describe_panic(&*panic);
                tracing::warn!(panic = %message, "intent detector panicked");
                return Ok(MessageHandlingResult::processing_failed(format!(
                    "intent detector panicked: {message}"
                )));
            }
        };
        if let Err(err) = self
            .store
            .dispatch(action::intent_understanding_succeeded(intent.id()))
        {
            return Ok(MessageHandlingResult::processing_failed(err));
        }

        tracing::trace!(phase = "resolving_edge", intent = intent.id());
        let mapping = match current_node {
            Some(node) => match self.map_intent(node, &intent).await {
                Ok(mapping) => mapping,
                Err(err) => return Ok(MessageHandlingResult::processing_failed(err)),
            },
            None => EdgeMapping::edge(intent.id()),
        };
        tracing::debug!(edge = %mapping.selection, "intent mapped");
        if let Err(err) = self
            .store
            .dispatch(action::mapped_intent_to_edge(mapping.selection))
        {
            return Ok(MessageHandlingResult::processing_failed(err));
        }
        if let Some(effect) = mapping.effect
            && let Err(err) = self.store.dispatch(effect)
        {
            return Ok(MessageHandlingResult::processing_failed(err));
        }

        tracing::trace!(phase = "awaiting_next_node");
        let next = self.find_next_node(intent.id())?;
        if let Err(err) = self
            .store
            .dispatch(action::node_processing_succeeded(next))
        {
            return Ok(MessageHandlingResult::processing_failed(err));
        }
        Ok(MessageHandlingResult::success(next))
    }

    async fn map_intent(&self, node: NodeId, intent: &Intent) -> Result<EdgeMapping, SchedulerError> {
        let graph = Arc::clone(&self.graph);
        let state = self.store.get_state();
        let intent = intent.clone();
        let job: MappingJob = Box::new(move || match graph.get_node(node) {
            Some(node) => node.map_intent_to_edge(&intent, &state),
            None => Err(MappingError::Failed(format!("node not found: {node}"))),
        });

        tracing::trace!(scheduler = self.scheduler.name(), "scheduling mapping");
        self.scheduler.schedule(job).await.inspect_err(|err| {
            tracing::warn!(error = %err, "intent mapping failed");
        })
    }

    fn find_next_node(&self, intent_id: &str) -> Result<NodeId, ConversationStructureError> {
        let state = self.store.get_state();
        let conversation = state.conversation();
        let selection = conversation
            .and_then(|c| c.edge.as_ref())
            .ok_or(ConversationStructureError::MissingEdgeId)?;
        let current = conversation
            .and_then(|c| c.current_node)
            .and_then(|id| self.graph.get_node(id));

        let Some(node) = current else {
            return match self.fallback(intent_id) {
                Some(target) => {
                    tracing::info!(intent = intent_id, %target, "no current node; using fallback");
                    self.resolve(target)
                }
                None => Err(ConversationStructureError::NoFallback {
                    intent: intent_id.to_string(),
                }),
            };
        };

        if let Some(edge) = selection.resolve(node.edges()) {
            tracing::debug!(edge = %selection, target = %edge.target, "following edge");
            return self.resolve(edge.target);
        }

        match self.fallback(intent_id) {
            Some(target) => {
                tracing::info!(node = %node.id(), intent = intent_id, %target, "no matching edge; using fallback");
                self.resolve(target)
            }
            None => Err(ConversationStructureError::NoMatchingEndNode {
                node: node.id(),
                intent: intent_id.to_string(),
            }),
        }
    }

    fn resolve(&self, target: NodeId) -> Result<NodeId, ConversationStructureError> {
        if self.graph.contains(target) {
            Ok(target)
        } else {
            Err(ConversationStructureError::MissingNode(target))
        }
    }
}

impl fmt::Debug for ConversationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationEngine")
            .field("graph", &self.graph)
            .field("scheduler", &self.scheduler)
            .field("store", &self.store)
            .field("fallbacks", &self.fallbacks)
            .finish_non_exhaustive()
    }
}

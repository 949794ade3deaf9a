//! Tests for edge resolution, fallback routing and mapping schedulers.


use std::sync::Arc;

use colloquy_graph::prelude::*;
use colloquy_store::prelude::*;
use proptest::prelude::*;
use test_utils::*;

fn node(id: u32) -> ConversationNode {
    ConversationNode::new(NodeId::new(id))
}

fn engine_at(graph: Graph, start: u32) -> ConversationEngine {
    ConversationEngine::builder(Arc::new(graph), EchoDetector)
        .starting_at(NodeId::new(start))
        .build()
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

// ─────────────────────────────────────────────────────────────────────────────
// Fallbacks
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fallback_is_used_when_no_edge_matches() {
    let mut engine = math_engine();
    engine.register_fallback("HELP", WRONG);

    let result = engine.handle_incoming_message("help").await.unwrap();

    assert_eq!(result, MessageHandlingResult::success(WRONG));
    assert_eq!(current_node(&engine), Some(WRONG));
}

#[tokio::test]
async fn matching_edge_takes_precedence_over_fallback() {
    let mut engine = math_engine();
    engine.register_fallback("NUMBER_ANSWER", QUESTION);

    engine.handle_incoming_message("five").await.unwrap();

    assert_eq!(current_node(&engine), Some(RIGHT));
}

#[tokio::test]
async fn fallback_catches_rejected_validators() {
    let mut engine = math_engine();
    engine.register_fallback("YES", WRONG);
    engine.handle_incoming_message("five").await.unwrap();

    let result = engine.handle_incoming_message("nope").await.unwrap();

    assert!(result.ok);
    assert_eq!(current_node(&engine), Some(WRONG));
}

#[tokio::test]
async fn register_fallback_overwrites() {
    let mut engine = math_engine();
    assert_eq!(engine.register_fallback("HELP", WRONG), None);
    assert_eq!(engine.register_fallback("HELP", RIGHT), Some(WRONG));
    assert_eq!(engine.fallback("HELP"), Some(RIGHT));

    engine.handle_incoming_message("help").await.unwrap();
    assert_eq!(current_node(&engine), Some(RIGHT));
}

#[tokio::test]
async fn conversation_without_current_node_starts_from_a_fallback() {
    let (recorder, selections) = selection_recorder();
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector())
        .with_fallback("HELP", QUESTION)
        .with_middleware(recorder)
        .build();
    assert_eq!(current_node(&engine), None);

    let result = engine.handle_incoming_message("help").await.unwrap();

    assert_eq!(result, MessageHandlingResult::success(QUESTION));
    assert_eq!(*selections.lock(), vec![EdgeMapping::edge("HELP").selection]);
}

#[tokio::test]
async fn conversation_without_current_node_needs_a_fallback() {
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector()).build();

    let err = engine.handle_incoming_message("help").await.unwrap_err();

    assert_eq!(
        err,
        ConversationStructureError::NoFallback {
            intent: "HELP".to_string(),
        }
    );
}

#[tokio::test]
async fn unknown_current_node_is_treated_as_no_node() {
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector())
        .starting_at(NodeId::new(42))
        .with_fallback("HELP", QUESTION)
        .build();

    engine.handle_incoming_message("help").await.unwrap();

    assert_eq!(current_node(&engine), Some(QUESTION));
}

// ─────────────────────────────────────────────────────────────────────────────
// Structure Errors
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dangling_edge_target_is_fatal() {
    let mut graph = Graph::new();
    graph
        .add_node(node(1).with_edge(Edge::new("GO", NodeId::new(2))))
        .unwrap();
    let mut engine = engine_at(graph, 1);

    let err = engine.handle_incoming_message("GO").await.unwrap_err();

    assert_eq!(err, ConversationStructureError::MissingNode(NodeId::new(2)));
    assert_eq!(current_node(&engine), Some(NodeId::new(1)));
}

#[tokio::test]
async fn dangling_fallback_target_is_fatal() {
    let mut graph = Graph::new();
    graph.add_node(node(1)).unwrap();
    let mut engine = engine_at(graph, 1);
    engine.register_fallback("GO", NodeId::new(7));

    let err = engine.handle_incoming_message("GO").await.unwrap_err();

    assert_eq!(err, ConversationStructureError::MissingNode(NodeId::new(7)));
}

/// Swallows edge selections so that none is ever recorded.
struct DropSelections;

impl Middleware for DropSelections {
    fn dispatch(&self, state: &State, action: Action, next: Next<'_>) -> Result<State, StoreError> {
        if action.is(action::MAPPED_INTENT_TO_EDGE) {
            return Ok(state.clone());
        }
        next.run(action)
    }
}

#[tokio::test]
async fn missing_edge_selection_is_fatal() {
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector())
        .starting_at(QUESTION)
        .with_reducer(MATH_SLICE, math_reducer())
        .with_middleware(DropSelections)
        .build();

    let err = engine.handle_incoming_message("five").await.unwrap_err();

    assert_eq!(err, ConversationStructureError::MissingEdgeId);
}

#[test]
fn engine_validate_reports_edges_and_fallbacks() {
    let mut graph = Graph::new();
    graph
        .add_node(node(1).with_edge(Edge::new("GO", NodeId::new(3))))
        .unwrap();
    let mut engine = engine_at(graph, 1);
    engine.register_fallback("HELP", NodeId::new(1));
    engine.register_fallback("LOST", NodeId::new(9));

    let errors = engine.validate().unwrap_err();

    assert_eq!(
        errors,
        vec![
            ValidationError::InvalidEdgeTarget {
                node: NodeId::new(1),
                edge: EdgeId::new("GO"),
                target: NodeId::new(3),
            },
            ValidationError::InvalidFallbackTarget {
                intent: "LOST".to_string(),
                target: NodeId::new(9),
            },
        ]
    );
    assert!(math_engine().validate().is_ok());
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared Intents
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rejected_edge_is_not_taken_when_a_later_edge_shares_its_id() {
    let mut graph = Graph::new();
    graph
        .add_node(
            node(1)
                .with_edge(
                    Edge::new("A", NodeId::new(2))
                        .with_validator(Validator::new(|_: &Intent, _: &State| false)),
                )
                .with_edge(
                    Edge::new("A", NodeId::new(3))
                        .with_effect(Effect::new(|_: &Intent, _: &State| Ok(Action::new("SECOND")))),
                ),
        )
        .unwrap()
        .add_node(node(2))
        .unwrap()
        .add_node(node(3))
        .unwrap();
    let (recorder, seen) = action_recorder();
    let mut engine = ConversationEngine::builder(Arc::new(graph), EchoDetector)
        .starting_at(NodeId::new(1))
        .with_middleware(recorder)
        .build();

    let result = engine.handle_incoming_message("A").await.unwrap();

    assert_eq!(result.node, Some(NodeId::new(3)));
    assert_eq!(current_node(&engine), Some(NodeId::new(3)));
    assert!(seen.lock().iter().any(|seen_type| seen_type == "SECOND"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Node Variants
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn custom_node_can_route_on_state() {
    let mapper = |edges: &[Edge], _intent: &Intent, state: &State| {
        let answered = state
            .slice::<Math>(MATH_SLICE)
            .is_some_and(|math| math.answer.is_some());
        let wanted = if answered { "DONE" } else { "ASK" };
        edges
            .iter()
            .find(|edge| edge.id == *wanted)
            .map(|edge| EdgeMapping::edge(edge.id.clone()))
            .ok_or_else(|| MappingError::Failed(format!("no {wanted} edge")))
    };

    let mut graph = Graph::new();
    graph
        .add_node(
            CustomNode::new(NodeId::new(1), mapper)
                .with_edge(Edge::new("ASK", NodeId::new(2)))
                .with_edge(Edge::new("DONE", NodeId::new(3))),
        )
        .unwrap()
        .add_node(node(2))
        .unwrap()
        .add_node(node(3))
        .unwrap();

    let mut engine = ConversationEngine::builder(Arc::new(graph), EchoDetector)
        .starting_at(NodeId::new(1))
        .with_reducer(MATH_SLICE, math_reducer())
        .build();
    engine
        .dispatch(Action::with_payload(SET_ANSWER, "5".to_string()))
        .unwrap();

    engine.handle_incoming_message("anything").await.unwrap();

    assert_eq!(current_node(&engine), Some(NodeId::new(3)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Schedulers
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_pool_runs_the_quiz() {
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector())
        .starting_at(QUESTION)
        .with_reducer(MATH_SLICE, math_reducer())
        .with_scheduler(WorkerPool::new(2))
        .build();

    for (text, expected) in [("five", RIGHT), ("yes", QUESTION), ("6", WRONG)] {
        let result = engine.handle_incoming_message(text).await.unwrap();
        assert!(result.ok, "{text}: {result:?}");
        assert_eq!(current_node(&engine), Some(expected));
    }
    assert_eq!(answer(&engine).as_deref(), Some("6"));
}

/// Refuses every job.
struct ClosedScheduler;

impl MappingScheduler for ClosedScheduler {
    fn name(&self) -> &str {
        "closed"
    }

    fn schedule(&self, _job: MappingJob) -> BoxFuture<'_, Result<EdgeMapping, SchedulerError>> {
        Box::pin(async { Err(SchedulerError::Unavailable("shutting down".to_string())) })
    }
}

#[tokio::test]
async fn scheduler_error_is_reported_as_is() {
    let (recorder, seen) = action_recorder();
    let mut engine = ConversationEngine::builder(Arc::new(math_graph()), math_detector())
        .starting_at(QUESTION)
        .with_scheduler(ClosedScheduler)
        .with_middleware(recorder)
        .build();

    let result = engine.handle_incoming_message("five").await.unwrap();

    assert_eq!(result.error_code, Some(ErrorCode::IntentProcessingFailed));
    assert_eq!(
        result.error_message,
        Some(SchedulerError::Unavailable("shutting down".to_string()).to_string())
    );
    assert!(!seen.lock().iter().any(|seen_type| seen_type == action::MAPPED_INTENT_TO_EDGE));
    assert_eq!(current_node(&engine), Some(QUESTION));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_validator_is_a_processing_failure() {
    let mut graph = Graph::new();
    graph
        .add_node(
            node(1).with_edge(
                Edge::new("GO", NodeId::new(1))
                    .with_validator(Validator::new(|_: &Intent, _: &State| panic!("validator fault"))),
            ),
        )
        .unwrap();

    let graph = Arc::new(graph);
    let mut inline = ConversationEngine::builder(Arc::clone(&graph), EchoDetector)
        .starting_at(NodeId::new(1))
        .build();
    let mut pooled = ConversationEngine::builder(graph, EchoDetector)
        .starting_at(NodeId::new(1))
        .with_scheduler(WorkerPool::new(1))
        .build();

    for engine in [&mut inline, &mut pooled] {
        let result = engine.handle_incoming_message("GO").await.unwrap();
        assert_eq!(result.error_code, Some(ErrorCode::IntentProcessingFailed));
        assert_eq!(
            result.error_message.as_deref(),
            Some("mapping panicked: validator fault")
        );
        assert_eq!(current_node(engine), Some(NodeId::new(1)));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Properties
// ─────────────────────────────────────────────────────────────────────────────

proptest! {
    /// For every node and every unvalidated edge of it, detecting the edge's
    /// intent at that node moves the conversation to the edge's target.
    #[test]
    fn every_edge_is_traversable(targets in prop::collection::vec(
        prop::collection::vec(0_u32..6, 0..4),
        6,
    )) {
        let mut graph = Graph::new();
        for (id, edges) in targets.iter().enumerate() {
            let mut n = node(id as u32);
            for (j, target) in edges.iter().enumerate() {
                n = n.with_edge(Edge::new(format!("I{j}"), NodeId::new(*target)));
            }
            graph.add_node(n).unwrap();
        }
        let graph = Arc::new(graph);

        for (id, edges) in targets.iter().enumerate() {
            for (j, target) in edges.iter().enumerate() {
                let mut engine = ConversationEngine::builder(Arc::clone(&graph), EchoDetector)
                    .starting_at(NodeId::new(id as u32))
                    .build();
                let result = block_on(engine.handle_incoming_message(&format!("I{j}"))).unwrap();
                prop_assert_eq!(result, MessageHandlingResult::success(NodeId::new(*target)));
            }
        }
    }

    /// Among edges sharing an intent, the first one whose validator accepts
    /// wins whether or not the edges share an id; with none accepting, the
    /// fallback is used.
    #[test]
    fn first_accepting_edge_wins(
        accepts in prop::collection::vec(any::<bool>(), 1..8),
        distinct_ids in any::<bool>(),
    ) {
        let mut start = node(0);
        for (i, accept) in accepts.iter().copied().enumerate() {
            let mut edge = Edge::new("GO", NodeId::new(i as u32 + 1))
                .with_validator(Validator::new(move |_: &Intent, _: &State| accept));
            if distinct_ids {
                edge = edge.with_id(format!("GO_{i}"));
            }
            start = start.with_edge(edge);
        }
        let mut graph = Graph::new();
        graph.add_node(start).unwrap();
        for i in 0..=accepts.len() {
            graph.add_node(node(i as u32 + 1)).unwrap();
        }
        graph.add_node(node(99)).unwrap();

        let mut engine = engine_at(graph, 0);
        engine.register_fallback("GO", NodeId::new(99));

        let expected = accepts
            .iter()
            .position(|accept| *accept)
            .map_or(NodeId::new(99), |i| NodeId::new(i as u32 + 1));
        let result = block_on(engine.handle_incoming_message("GO")).unwrap();
        prop_assert_eq!(result.node, Some(expected));
    }

    /// Edges sharing one id resolve to the earliest declared edge.
    #[test]
    fn duplicate_edge_ids_resolve_to_the_first(count in 2_usize..6) {
        let mut start = node(0);
        for i in 0..count {
            start = start.with_edge(Edge::new("GO", NodeId::new(i as u32 + 1)));
        }
        let mut graph = Graph::new();
        graph.add_node(start).unwrap();
        for i in 0..count {
            graph.add_node(node(i as u32 + 1)).unwrap();
        }

        let mut engine = engine_at(graph, 0);
        let result = block_on(engine.handle_incoming_message("GO")).unwrap();
        prop_assert_eq!(result.node, Some(NodeId::new(1)));
    }
}

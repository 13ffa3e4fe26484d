//! Integration tests for the dispatch core:
//! - Priority ranking and arbitration over ranked participants
//! - Blocking short-circuit across a full dispatch pass
//! - Strategy selection and execution feeding back into the event
//! - Resource registry lifecycle alongside dispatch

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use synapse::config::{DiscoveryConfig, RegistryConfig};
use synapse::engine::{DecisionConfig, DecisionMaker, Dispatcher, EvaluationState};
use synapse::providers::MockModel;
use synapse::resources::{ModelEndpointResource, ResourceRegistration, ResourceRegistry};
use synapse::store::{MemoryStore, StateStore};
use synapse::strategy::StrategyEngine;
use synapse::types::{ActionType, Behavior, Event, Participant, Role};

fn build_dispatcher(model: Arc<MockModel>, store: Arc<MemoryStore>) -> Dispatcher {
    Dispatcher::new(
        DecisionMaker::new(DecisionConfig::default()),
        StrategyEngine::new(model),
        Arc::new(ResourceRegistry::new()),
        store,
    )
}

#[tokio::test]
async fn test_arbitrator_wins_and_blocks_finance_event() {
    // P1: member handling finance events, non-exclusive invoke.
    let p1 = Participant::new("finance-bot", Role::Member)
        .with_behavior(Behavior::new("finance/*", ActionType::Invoke, json!({})));

    // P2: arbitrator with an exclusive catch-all.
    let p2 = Participant::new("overseer", Role::Arbitrator)
        .with_behavior(Behavior::new("#", ActionType::Invoke, json!({})).exclusive());

    let model = Arc::new(MockModel::new());
    let store = Arc::new(MemoryStore::new());
    let dispatcher = build_dispatcher(model, store);

    let event = Event::new("finance/transaction/completed", json!({})).unwrap();
    let report = dispatcher.dispatch(event, &[p1, p2]).await.unwrap();

    // The arbitrator's role weight dominates: it is selected first,
    // decides Blocking, and the member is never evaluated.
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].participant_name, "overseer");
    assert_eq!(report.outcomes[0].state, EvaluationState::Blocking);
    assert!(report.event.is_blocked());
}

#[tokio::test]
async fn test_ranked_walk_reaches_lower_priority_on_continue() {
    let leader = Participant::new("leader", Role::Leader).with_behavior(Behavior::new(
        "orders/*",
        ActionType::Invoke,
        json!({ "step_type": "count_items", "items": [1, 2, 3] }),
    ));
    let member = Participant::new("member", Role::Member).with_behavior(Behavior::new(
        "orders/*",
        ActionType::Invoke,
        json!({ "step_type": "calculate_sum", "numbers": [10, 20] }),
    ));

    let dispatcher = build_dispatcher(Arc::new(MockModel::new()), Arc::new(MemoryStore::new()));
    let event = Event::new("orders/created", json!({ "order": 7 })).unwrap();
    let report = dispatcher.dispatch(event, &[member, leader]).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    // Strict descending priority order: leader first.
    assert_eq!(report.outcomes[0].participant_name, "leader");
    assert!(report.outcomes[0].priority > report.outcomes[1].priority);

    let leader_exec = report.outcomes[0].execution.as_ref().unwrap();
    assert_eq!(leader_exec.result["count"], json!(3));
    let member_exec = report.outcomes[1].execution.as_ref().unwrap();
    assert_eq!(member_exec.result["sum"].as_f64(), Some(30.0));

    assert!(!report.event.is_blocked());
}

#[tokio::test]
async fn test_routine_action_blocks_propagation() {
    let logger = Participant::new("audit-logger", Role::Coordinator).with_behavior(
        Behavior::new(
            "audit/*",
            ActionType::Routine,
            json!({ "step_type": "count_items", "items": [] }),
        ),
    );
    let other = Participant::new("other", Role::Member)
        .with_behavior(Behavior::new("audit/*", ActionType::Invoke, json!({})));

    let dispatcher = build_dispatcher(Arc::new(MockModel::new()), Arc::new(MemoryStore::new()));
    let event = Event::new("audit/entry", json!({})).unwrap();
    let report = dispatcher.dispatch(event, &[other, logger]).await.unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].participant_name, "audit-logger");
    assert!(report.event.is_blocked());
}

#[tokio::test]
async fn test_conversational_fallback_still_replies() {
    let model = MockModel::new();
    model.push_err("model offline");

    let chatty = Participant::new("chatty", Role::Member).with_behavior(Behavior::new(
        "chat/*",
        ActionType::Invoke,
        json!({ "step_type": "respond", "message": "hello?" }),
    ));

    let dispatcher = build_dispatcher(Arc::new(model), Arc::new(MemoryStore::new()));
    let event = Event::new("chat/message", json!({})).unwrap();
    let report = dispatcher.dispatch(event, &[chatty]).await.unwrap();

    let execution = report.outcomes[0].execution.as_ref().unwrap();
    assert!(execution.success);
    assert!(execution.metadata.confidence < 0.5);
    assert!(execution.result["reply"].as_str().is_some());
}

#[tokio::test]
async fn test_run_state_lands_in_store_with_ttl() {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = build_dispatcher(Arc::new(MockModel::new()), store.clone());

    let calc = Participant::new("calc", Role::Member).with_behavior(Behavior::new(
        "math/*",
        ActionType::Invoke,
        json!({ "step_type": "calculate_average", "numbers": [4, 6] }),
    ));
    let participant_id = calc.id;

    let event = Event::new("math/avg", json!({})).unwrap();
    let event_id = event.id;
    dispatcher.dispatch(event, &[calc]).await.unwrap();

    let stored = store
        .get(&format!("run:{}:{}", event_id, participant_id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["result"]["average"].as_f64(), Some(5.0));
}

#[tokio::test]
async fn test_registry_backed_tools_reach_execution_context() {
    let registry = Arc::new(ResourceRegistry::new());
    registry.register(ResourceRegistration::new("llm", "model", || {
        Arc::new(ModelEndpointResource::new("llm", Arc::new(MockModel::new())))
    }));

    let config = RegistryConfig {
        discovery: DiscoveryConfig {
            enabled: false,
            interval_secs: 3600,
        },
        ..RegistryConfig::default()
    }
    .with_category("model", true);

    registry.initialize(config).await.unwrap();
    registry.run_discovery().await;
    assert!(registry.is_resource_available("llm").await);

    let dispatcher = Dispatcher::new(
        DecisionMaker::new(DecisionConfig::default()),
        StrategyEngine::new(Arc::new(MockModel::new())),
        registry.clone(),
        Arc::new(MemoryStore::new()),
    );

    let participant = Participant::new("worker", Role::Member).with_behavior(Behavior::new(
        "jobs/*",
        ActionType::Invoke,
        json!({ "step_type": "calculate_sum", "numbers": [1] }),
    ));

    let event = Event::new("jobs/run", json!({})).unwrap();
    let report = dispatcher.dispatch(event, &[participant]).await.unwrap();
    assert!(report.outcomes[0].execution.as_ref().unwrap().success);

    registry.shutdown().await.unwrap();
    assert!(registry.get_all_resources().await.is_empty());
}

#[tokio::test]
async fn test_blocked_event_declines_everyone() {
    let participant = Participant::new("p", Role::Member)
        .with_behavior(Behavior::new("#", ActionType::Invoke, json!({})));

    let dispatcher = build_dispatcher(Arc::new(MockModel::new()), Arc::new(MemoryStore::new()));
    let mut event = Event::new("a/b", json!({})).unwrap();
    event.block("pre-blocked upstream");

    let report = dispatcher.dispatch(event, &[participant]).await.unwrap();
    assert_eq!(report.outcomes[0].state, EvaluationState::Declined);
    assert!(report.outcomes[0].execution.is_none());
    assert_eq!(
        report.event.progression.reason.as_deref(),
        Some("pre-blocked upstream")
    );
}

#[tokio::test]
async fn test_store_defensive_copy_under_dispatch_keys() {
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let original = json!({ "phase": "initial" });
    store
        .set("scratch", original.clone(), Some(Duration::from_secs(60)))
        .await
        .unwrap();

    let mut copy = store.get("scratch").await.unwrap().unwrap();
    copy["phase"] = json!("mutated");

    assert_eq!(store.get("scratch").await.unwrap().unwrap(), original);
}

//! Dispatch entry point: one pass of arbitration and execution for a
//! single event.

use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::decision::{first_matching_behavior, DecisionMaker, EvaluationState};
use crate::engine::priority::sort_by_priority;
use crate::resources::ResourceRegistry;
use crate::store::StateStore;
use crate::strategy::StrategyEngine;
use crate::types::{
    Behavior, Decision, Event, ExecutionContext, Participant, ParticipantId, StrategyResult,
    StrategyType,
};

/// How long per-step run state stays in the state store.
const RUN_STATE_TTL: Duration = Duration::from_secs(3600);

pub struct Dispatcher {
    decisions: DecisionMaker,
    engine: StrategyEngine,
    registry: Arc<ResourceRegistry>,
    store: Arc<dyn StateStore>,
}

/// What happened to one participant during a dispatch pass.
#[derive(Debug, Clone)]
pub struct ParticipantOutcome {
    pub participant_id: ParticipantId,
    pub participant_name: String,
    pub priority: f64,
    pub state: EvaluationState,
    pub decision: Decision,
    pub execution: Option<StrategyResult>,
}

/// Full record of one dispatch pass, including the event's final
/// progression state.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event: Event,
    pub outcomes: Vec<ParticipantOutcome>,
}

impl Dispatcher {
    pub fn new(
        decisions: DecisionMaker,
        engine: StrategyEngine,
        registry: Arc<ResourceRegistry>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            decisions,
            engine,
            registry,
            store,
        }
    }

    /// Walks participants in strict descending priority order, executing
    /// handlers and stopping at the first blocking decision. Participant
    /// misbehavior degrades to a decline; only configuration errors
    /// (no strategy for a step) surface as `Err`.
    pub async fn dispatch(
        &self,
        mut event: Event,
        participants: &[Participant],
    ) -> Result<DispatchReport> {
        let ranked = sort_by_priority(participants, &event, self.decisions.weights());
        let mut outcomes = Vec::with_capacity(ranked.len());

        for (participant, score) in ranked {
            let evaluation = self.decisions.evaluate(participant, &event);

            let mut execution = None;
            if evaluation.decision.should_handle {
                if let Some(behavior) = first_matching_behavior(participant, &event.topic) {
                    let context = self.build_context(behavior, &event).await;
                    let result = self.engine.execute(&context).await?;

                    let key = format!("run:{}:{}", event.id, participant.id);
                    if let Err(e) = self
                        .store
                        .set(&key, serde_json::to_value(&result)?, Some(RUN_STATE_TTL))
                        .await
                    {
                        log::warn!("failed to persist run state for '{}': {}", key, e);
                    }
                    execution = Some(result);
                }
            }

            let blocking = evaluation.decision.is_blocking();
            if blocking {
                let reason = evaluation
                    .decision
                    .response
                    .as_ref()
                    .map(|r| r.reason.clone())
                    .unwrap_or_else(|| "blocked".to_string());
                event.block(reason);
            }

            outcomes.push(ParticipantOutcome {
                participant_id: participant.id,
                participant_name: participant.name.clone(),
                priority: score,
                state: evaluation.state,
                decision: evaluation.decision,
                execution,
            });

            // A blocking decision ends the pass; lower-priority
            // participants are never evaluated for this event.
            if blocking {
                break;
            }
        }

        Ok(DispatchReport { event, outcomes })
    }

    /// Converts a matched action into an execution context: action
    /// payload fields become inputs, the event rides along, and the
    /// currently-available resources become the tool budget.
    async fn build_context(&self, behavior: &Behavior, event: &Event) -> ExecutionContext {
        let payload = &behavior.action.payload;

        let step_type = payload
            .get("step_type")
            .and_then(|v| v.as_str())
            .unwrap_or_else(|| behavior.action.action_type.as_str())
            .to_string();

        let mut inputs = match payload {
            Value::Object(_) => payload.clone(),
            other => json!({ "payload": other }),
        };
        if let Value::Object(map) = &mut inputs {
            map.insert("event".to_string(), event.payload.clone());
            map.insert("topic".to_string(), json!(event.topic));
        }

        let mut context = ExecutionContext::new(step_type, inputs);
        context.resources.tools = self.registry.available_resources().await;

        if let Some(strategy) = payload.get("strategy").and_then(|v| v.as_str()) {
            match serde_json::from_value::<StrategyType>(json!(strategy)) {
                Ok(strategy) => context.config.strategy = Some(strategy),
                Err(_) => log::warn!("ignoring unknown strategy override '{}'", strategy),
            }
        }

        context
    }
}

//! Arbitration state machine: decides per participant whether to handle
//! an event and whether to block further propagation.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::engine::priority::{self, PriorityWeights};
use crate::engine::topic;
use crate::types::{
    ActionType, Behavior, Decision, Event, Participant, ProgressionState, Role,
};

/// Evaluation states for one (participant, event) pair.
///
/// `NotEvaluated -> Evaluating -> { Declined, Handling }`, with
/// `Handling` resolving to `Blocking` or `NonBlocking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationState {
    NotEvaluated,
    Evaluating,
    Declined,
    Handling,
    Blocking,
    NonBlocking,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Topic patterns that no participant may intercept.
    pub non_interceptable: Vec<String>,
    #[serde(default)]
    pub weights: PriorityWeights,
}

pub struct DecisionMaker {
    config: DecisionConfig,
}

/// Outcome of one evaluation: the terminal state reached plus the
/// decision handed back to the dispatch loop.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub state: EvaluationState,
    pub decision: Decision,
}

impl DecisionMaker {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    /// Evaluates a participant against an event. Never fails: any
    /// internal error degrades to `Declined` with the failure reason in
    /// the decision payload, so arbitration cannot abort the dispatch
    /// loop.
    pub fn evaluate(&self, participant: &Participant, event: &Event) -> Evaluation {
        let score = priority::priority(participant, event, &self.config.weights);

        match self.evaluate_inner(participant, event, score) {
            Ok(evaluation) => evaluation,
            Err(e) => {
                log::warn!(
                    "decision evaluation failed for participant {}: {}",
                    participant.name,
                    e
                );
                Evaluation {
                    state: EvaluationState::Declined,
                    decision: Decision::declined(score, format!("evaluation failed: {}", e)),
                }
            }
        }
    }

    fn evaluate_inner(
        &self,
        participant: &Participant,
        event: &Event,
        score: f64,
    ) -> Result<Evaluation> {
        let mut state = EvaluationState::NotEvaluated;
        state = transition(state, EvaluationState::Evaluating)?;

        // Gate 1: an already-blocked event propagates no further.
        if event.is_blocked() {
            state = transition(state, EvaluationState::Declined)?;
            return Ok(Evaluation {
                state,
                decision: Decision::declined(score, "event already blocked"),
            });
        }

        // Gate 2: some topics cannot be intercepted at all.
        if !self.is_interceptable(&event.topic) {
            state = transition(state, EvaluationState::Declined)?;
            return Ok(Evaluation {
                state,
                decision: Decision::declined(
                    score,
                    format!("topic '{}' is not interceptable", event.topic),
                ),
            });
        }

        // Gate 3: a matching behavior is required, except for
        // arbitrators, which always pass this gate.
        let matched = first_matching_behavior(participant, &event.topic);
        if matched.is_none() && participant.role != Role::Arbitrator {
            state = transition(state, EvaluationState::Declined)?;
            return Ok(Evaluation {
                state,
                decision: Decision::declined(score, "no behavior matches event topic"),
            });
        }

        state = transition(state, EvaluationState::Handling)?;

        // Blocking if the matched behavior is exclusive or its action is
        // fire-and-forget; invoke actions and unmatched arbitrators let
        // lower-priority participants keep evaluating.
        let (blocking, reason) = match matched {
            Some(behavior) if behavior.is_exclusive() => (
                true,
                format!(
                    "exclusive behavior '{}' blocks propagation",
                    behavior.trigger.topic
                ),
            ),
            Some(behavior) if behavior.action.action_type == ActionType::Routine => (
                true,
                format!(
                    "routine action for '{}' blocks propagation",
                    behavior.trigger.topic
                ),
            ),
            Some(behavior) => (
                false,
                format!(
                    "handling '{}' action for '{}', propagation continues",
                    behavior.action.action_type.as_str(),
                    behavior.trigger.topic
                ),
            ),
            None => (false, "arbitrator handling without matched behavior".to_string()),
        };

        let (state, progression) = if blocking {
            (
                transition(state, EvaluationState::Blocking)?,
                ProgressionState::Block,
            )
        } else {
            (
                transition(state, EvaluationState::NonBlocking)?,
                ProgressionState::Continue,
            )
        };

        Ok(Evaluation {
            state,
            decision: Decision::handling(score, progression, reason),
        })
    }

    fn is_interceptable(&self, topic: &str) -> bool {
        !self
            .config
            .non_interceptable
            .iter()
            .any(|pattern| topic::matches(pattern, topic))
    }

    pub fn weights(&self) -> &PriorityWeights {
        &self.config.weights
    }
}

/// Returns the first behavior whose trigger pattern matches the topic.
pub fn first_matching_behavior<'a>(
    participant: &'a Participant,
    topic: &str,
) -> Option<&'a Behavior> {
    participant
        .behaviors
        .iter()
        .find(|b| topic::matches(&b.trigger.topic, topic))
}

fn transition(from: EvaluationState, to: EvaluationState) -> Result<EvaluationState> {
    let valid = matches!(
        (from, to),
        (EvaluationState::NotEvaluated, EvaluationState::Evaluating)
            | (EvaluationState::Evaluating, EvaluationState::Declined)
            | (EvaluationState::Evaluating, EvaluationState::Handling)
            | (EvaluationState::Handling, EvaluationState::Blocking)
            | (EvaluationState::Handling, EvaluationState::NonBlocking)
    );

    if !valid {
        anyhow::bail!("invalid evaluation transition {:?} -> {:?}", from, to);
    }
    Ok(to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use serde_json::json;

    fn maker() -> DecisionMaker {
        DecisionMaker::new(DecisionConfig::default())
    }

    fn event(topic: &str) -> Event {
        Event::new(topic, json!({})).unwrap()
    }

    #[test]
    fn test_declines_blocked_event() {
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("#", ActionType::Invoke, json!({})));
        let mut e = event("a/b");
        e.block("upstream");

        let evaluation = maker().evaluate(&participant, &e);
        assert_eq!(evaluation.state, EvaluationState::Declined);
        assert!(!evaluation.decision.should_handle);
    }

    #[test]
    fn test_declines_non_interceptable_topic() {
        let maker = DecisionMaker::new(DecisionConfig {
            non_interceptable: vec!["system/*".to_string()],
            weights: PriorityWeights::default(),
        });
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("#", ActionType::Invoke, json!({})));

        let evaluation = maker.evaluate(&participant, &event("system/shutdown"));
        assert_eq!(evaluation.state, EvaluationState::Declined);

        let reason = evaluation.decision.response.unwrap().reason;
        assert!(reason.contains("not interceptable"));
    }

    #[test]
    fn test_declines_without_matching_behavior() {
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("billing/*", ActionType::Invoke, json!({})));

        let evaluation = maker().evaluate(&participant, &event("finance/tx"));
        assert_eq!(evaluation.state, EvaluationState::Declined);
    }

    #[test]
    fn test_arbitrator_passes_match_gate() {
        let participant = Participant::new("arb", Role::Arbitrator);

        let evaluation = maker().evaluate(&participant, &event("finance/tx"));
        assert_eq!(evaluation.state, EvaluationState::NonBlocking);
        assert!(evaluation.decision.should_handle);
    }

    #[test]
    fn test_exclusive_behavior_blocks() {
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("a/b", ActionType::Invoke, json!({})).exclusive());

        let evaluation = maker().evaluate(&participant, &event("a/b"));
        assert_eq!(evaluation.state, EvaluationState::Blocking);
        assert!(evaluation.decision.is_blocking());
    }

    #[test]
    fn test_routine_action_blocks() {
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("a/b", ActionType::Routine, json!({})));

        let evaluation = maker().evaluate(&participant, &event("a/b"));
        assert_eq!(evaluation.state, EvaluationState::Blocking);
    }

    #[test]
    fn test_invoke_action_does_not_block() {
        let participant = Participant::new("p", Role::Member)
            .with_behavior(Behavior::new("a/b", ActionType::Invoke, json!({})));

        let evaluation = maker().evaluate(&participant, &event("a/b"));
        assert_eq!(evaluation.state, EvaluationState::NonBlocking);
        assert!(evaluation.decision.should_handle);
        assert!(!evaluation.decision.is_blocking());
    }

    #[test]
    fn test_invalid_transition_rejected() {
        assert!(transition(EvaluationState::Declined, EvaluationState::Handling).is_err());
        assert!(transition(EvaluationState::NotEvaluated, EvaluationState::Blocking).is_err());
    }
}

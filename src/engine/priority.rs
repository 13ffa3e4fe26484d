//! Priority scoring for ranking participants against an event.

use serde::{Deserialize, Serialize};

use crate::engine::topic;
use crate::types::{Event, Participant, Role};

/// Tunable weights for priority scoring. The configured-priority weight
/// is the dominant term so operators can hard-override ranking; role and
/// specificity use fixed tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub configured_priority: f64,
    pub domain_match: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            configured_priority: 10.0,
            domain_match: 5.0,
        }
    }
}

/// Fixed role weight table: arbitrator > leader > coordinator >
/// specialist > member > unknown.
pub fn role_weight(role: Role) -> f64 {
    match role {
        Role::Arbitrator => 100.0,
        Role::Leader => 80.0,
        Role::Coordinator => 60.0,
        Role::Specialist => 40.0,
        Role::Member => 20.0,
        Role::Unknown => 10.0,
    }
}

/// Computes a participant's priority for an event as a weighted sum of
/// configured priority, best pattern specificity, role weight, and
/// domain overlap. Each factor is non-negative before weighting and the
/// final value is floored at zero.
pub fn priority(participant: &Participant, event: &Event, weights: &PriorityWeights) -> f64 {
    let configured = participant.priority.unwrap_or(0.0).max(0.0) * weights.configured_priority;

    let best_specificity = participant
        .behaviors
        .iter()
        .map(|b| topic::specificity(&b.trigger.topic))
        .fold(0.0_f64, f64::max);

    let role = role_weight(participant.role);

    let event_segments = event.segments();
    let domain_matches = participant
        .domains()
        .iter()
        .filter(|d| event_segments.contains(d))
        .count() as f64;

    (configured + best_specificity + role + domain_matches * weights.domain_match).max(0.0)
}

/// Returns participants ordered highest-priority first. Ties preserve
/// the input relative order; dispatch reproducibility depends on this.
pub fn sort_by_priority<'a>(
    participants: &'a [Participant],
    event: &Event,
    weights: &PriorityWeights,
) -> Vec<(&'a Participant, f64)> {
    let mut scored: Vec<(&Participant, f64)> = participants
        .iter()
        .map(|p| (p, priority(p, event, weights)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

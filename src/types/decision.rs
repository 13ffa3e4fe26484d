use serde::{Deserialize, Serialize};

use super::ProgressionState;

/// The outcome of evaluating one participant against one event.
///
/// Ephemeral: created fresh per (participant, event) pair and never
/// persisted directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub should_handle: bool,
    pub priority: f64,
    pub response: Option<DecisionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub progression: ProgressionState,
    pub reason: String,
}

impl Decision {
    pub fn declined(priority: f64, reason: impl Into<String>) -> Self {
        Self {
            should_handle: false,
            priority,
            response: Some(DecisionResponse {
                progression: ProgressionState::Continue,
                reason: reason.into(),
            }),
        }
    }

    pub fn handling(priority: f64, progression: ProgressionState, reason: impl Into<String>) -> Self {
        Self {
            should_handle: true,
            priority,
            response: Some(DecisionResponse {
                progression,
                reason: reason.into(),
            }),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.should_handle
            && self
                .response
                .as_ref()
                .map(|r| r.progression == ProgressionState::Block)
                .unwrap_or(false)
    }
}

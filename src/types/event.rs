use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EventId, ProgressionState};
use crate::error::SynapseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progression {
    pub state: ProgressionState,
    pub reason: Option<String>,
}

impl Progression {
    pub fn continuing() -> Self {
        Self {
            state: ProgressionState::Continue,
            reason: None,
        }
    }
}

/// A domain event flowing through arbitration.
///
/// Immutable once created except for `progression`, which moves
/// `Continue -> Block` at most once per dispatch pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub topic: String,
    pub progression: Progression,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Result<Self, SynapseError> {
        let topic = topic.into();
        validate_topic(&topic)?;

        Ok(Self {
            id: EventId::new_v4(),
            topic,
            progression: Progression::continuing(),
            payload,
            created_at: Utc::now(),
        })
    }

    /// Marks the event blocked. Monotonic: the first block wins and
    /// later calls keep the original reason.
    pub fn block(&mut self, reason: impl Into<String>) {
        if self.progression.state == ProgressionState::Block {
            return;
        }
        self.progression.state = ProgressionState::Block;
        self.progression.reason = Some(reason.into());
    }

    pub fn is_blocked(&self) -> bool {
        self.progression.state == ProgressionState::Block
    }

    pub fn segments(&self) -> Vec<&str> {
        self.topic.split('/').collect()
    }
}

fn validate_topic(topic: &str) -> Result<(), SynapseError> {
    if topic.is_empty() {
        return Err(SynapseError::MalformedTopic("empty topic".to_string()));
    }
    if topic.split('/').any(|s| s.trim().is_empty()) {
        return Err(SynapseError::MalformedTopic(topic.to_string()));
    }
    Ok(())
}

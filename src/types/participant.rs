use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ActionType, ParticipantId, Role};

/// A participant's declared rule mapping a topic pattern to an action.
///
/// Patterns are static configuration: an exact topic, the catch-all `"#"`,
/// or a prefix ending in `"/*"` matching one additional segment level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Behavior {
    pub trigger: Trigger,
    pub action: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub topic: String,
    pub progression: Option<TriggerProgression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerProgression {
    pub exclusive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: Value,
}

impl Behavior {
    pub fn new(pattern: impl Into<String>, action_type: ActionType, payload: Value) -> Self {
        Self {
            trigger: Trigger {
                topic: pattern.into(),
                progression: None,
            },
            action: Action {
                action_type,
                payload,
            },
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.trigger.progression = Some(TriggerProgression { exclusive: true });
        self
    }

    pub fn is_exclusive(&self) -> bool {
        self.trigger
            .progression
            .as_ref()
            .map(|p| p.exclusive)
            .unwrap_or(false)
    }
}

/// An autonomous participant ("bot"). Owned by platform configuration
/// and read-only to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
    pub priority: Option<f64>,
    pub behaviors: Vec<Behavior>,
}

impl Participant {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: ParticipantId::new_v4(),
            name: name.into(),
            role,
            priority: None,
            behaviors: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// First topic segments declared across behaviors, used as the
    /// participant's domains for priority scoring. Wildcard-only
    /// patterns declare no domain.
    pub fn domains(&self) -> Vec<&str> {
        let mut domains = Vec::new();
        for behavior in &self.behaviors {
            if let Some(first) = behavior.trigger.topic.split('/').next() {
                if first != "#" && first != "*" && first != "+" && !domains.contains(&first) {
                    domains.push(first);
                }
            }
        }
        domains
    }
}

pub mod context;
pub mod decision;
pub mod event;
pub mod participant;

pub use context::{
    Constraints, ExecutionContext, Feedback, PhaseOutcome, ResourceBudget, ResultMetadata,
    StepConfig, StepHistory, StrategyResult,
};
pub use decision::{Decision, DecisionResponse};
pub use event::{Event, Progression};
pub use participant::{Action, Behavior, Participant, Trigger, TriggerProgression};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EventId = Uuid;
pub type ParticipantId = Uuid;
pub type StepId = Uuid;

/// Progression state of an event as it moves through one dispatch pass.
///
/// Transitions are monotonic: `Continue -> Block`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressionState {
    Continue,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Arbitrator,
    Leader,
    Coordinator,
    Specialist,
    Member,
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Arbitrator => "arbitrator",
            Role::Leader => "leader",
            Role::Coordinator => "coordinator",
            Role::Specialist => "specialist",
            Role::Member => "member",
            Role::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Fire-and-forget work; nothing downstream needs a reply.
    Routine,
    /// Request/response work; lower-priority participants may still act.
    Invoke,
    Custom(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            ActionType::Routine => "routine",
            ActionType::Invoke => "invoke",
            ActionType::Custom(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyType {
    Deterministic,
    Reasoning,
    Conversational,
}

impl StrategyType {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyType::Deterministic => "deterministic",
            StrategyType::Reasoning => "reasoning",
            StrategyType::Conversational => "conversational",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceStatus {
    Unknown,
    Discovering,
    Available,
    Unavailable,
    Error,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceStatus::Unknown => "Unknown",
            ResourceStatus::Discovering => "Discovering",
            ResourceStatus::Available => "Available",
            ResourceStatus::Unavailable => "Unavailable",
            ResourceStatus::Error => "Error",
        }
    }
}

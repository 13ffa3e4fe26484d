use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StepId, StrategyType};
use crate::error::SynapseError;

/// Everything a strategy needs to execute one step. Built by the caller
/// from a matched action and passed by value into exactly one strategy
/// invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub step_id: StepId,
    pub step_type: String,
    pub inputs: Value,
    pub outputs: Value,
    pub config: StepConfig,
    pub constraints: Constraints,
    pub resources: ResourceBudget,
    pub history: StepHistory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Explicit strategy override; bypasses `can_handle` selection.
    pub strategy: Option<StrategyType>,
    pub parameters: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraints {
    pub max_tokens: u32,
    /// Wall-clock bound in milliseconds, enforced by the engine.
    pub max_time_ms: u64,
    pub required_confidence: f32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            max_time_ms: 60_000,
            required_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceBudget {
    pub credits: f64,
    pub tokens: u32,
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepHistory {
    pub recent_steps: Vec<String>,
    pub total_steps: u32,
    pub successes: u32,
    pub failures: u32,
}

impl ExecutionContext {
    pub fn new(step_type: impl Into<String>, inputs: Value) -> Self {
        Self {
            step_id: StepId::new_v4(),
            step_type: step_type.into(),
            inputs,
            outputs: Value::Null,
            config: StepConfig::default(),
            constraints: Constraints::default(),
            resources: ResourceBudget::default(),
            history: StepHistory::default(),
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyType) -> Self {
        self.config.strategy = Some(strategy);
        self
    }

    /// Boundary check before execution; a context that cannot name its
    /// step must be rejected rather than mis-routed.
    pub fn validate(&self) -> Result<(), SynapseError> {
        if self.step_type.trim().is_empty() {
            return Err(SynapseError::InvalidContext("step_type"));
        }
        if self.step_id.is_nil() {
            return Err(SynapseError::InvalidContext("step_id"));
        }
        Ok(())
    }
}

/// Result of one strategy execution. Never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResult {
    pub success: bool,
    pub result: Value,
    pub metadata: ResultMetadata,
    pub feedback: Option<Feedback>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub strategy_type: StrategyType,
    pub confidence: f32,
    pub tokens_used: u32,
    pub phases: Option<Vec<PhaseOutcome>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase: String,
    pub succeeded: bool,
    pub confidence: f32,
    pub tokens_used: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feedback {
    pub issues: Vec<String>,
}

impl StrategyResult {
    pub fn failure(strategy_type: StrategyType, issue: impl Into<String>) -> Self {
        Self {
            success: false,
            result: Value::Null,
            metadata: ResultMetadata {
                strategy_type,
                confidence: 0.0,
                tokens_used: 0,
                phases: None,
            },
            feedback: Some(Feedback {
                issues: vec![issue.into()],
            }),
        }
    }
}

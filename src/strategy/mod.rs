pub mod conversational;
pub mod deterministic;
pub mod reasoning;

pub use conversational::ConversationalStrategy;
pub use deterministic::DeterministicStrategy;
pub use reasoning::ReasoningStrategy;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::SynapseError;
use crate::providers::LanguageModel;
use crate::types::{ExecutionContext, StepConfig, StrategyResult, StrategyType};

/// Estimated resource consumption for one execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceEstimate {
    pub tokens: u32,
    pub api_calls: u32,
    pub compute_time_ms: u64,
    pub cost: f64,
}

/// One interchangeable execution technique.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn strategy_type(&self) -> StrategyType;
    fn name(&self) -> &str;
    fn can_handle(&self, step_type: &str, config: &StepConfig) -> bool;
    async fn execute(&self, context: &ExecutionContext) -> StrategyResult;
    fn estimate_resources(&self, context: &ExecutionContext) -> ResourceEstimate;
}

/// Selects and runs a strategy for each step.
///
/// Selection walks a fixed order, cheapest and most predictable first:
/// Deterministic, then Reasoning, then Conversational. An explicit
/// `config.strategy` override wins; no match is a configuration error.
pub struct StrategyEngine {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyEngine {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            strategies: vec![
                Box::new(DeterministicStrategy::new()),
                Box::new(ReasoningStrategy::new(model.clone())),
                Box::new(ConversationalStrategy::new(model)),
            ],
        }
    }

    pub fn select(&self, context: &ExecutionContext) -> Result<&dyn Strategy, SynapseError> {
        if let Some(requested) = context.config.strategy {
            return self
                .strategies
                .iter()
                .find(|s| s.strategy_type() == requested)
                .map(|s| s.as_ref())
                .ok_or_else(|| SynapseError::UnknownStrategy(requested.as_str().to_string()));
        }

        self.strategies
            .iter()
            .find(|s| s.can_handle(&context.step_type, &context.config))
            .map(|s| s.as_ref())
            .ok_or_else(|| SynapseError::NoStrategy(context.step_type.clone()))
    }

    /// Validates the context, selects a strategy, and runs it under the
    /// context's wall-clock bound. Exceeding the bound yields a
    /// timeout-classified failure rather than a hang.
    pub async fn execute(&self, context: &ExecutionContext) -> Result<StrategyResult> {
        context.validate()?;
        let strategy = self.select(context)?;

        let deadline = Duration::from_millis(context.constraints.max_time_ms);
        match tokio::time::timeout(deadline, strategy.execute(context)).await {
            Ok(result) => Ok(result),
            Err(_) => {
                log::warn!(
                    "strategy '{}' timed out after {}ms on step '{}'",
                    strategy.name(),
                    context.constraints.max_time_ms,
                    context.step_type
                );
                Ok(StrategyResult::failure(
                    strategy.strategy_type(),
                    format!(
                        "timeout: exceeded {}ms wall-clock bound",
                        context.constraints.max_time_ms
                    ),
                ))
            }
        }
    }

    pub fn estimate(&self, context: &ExecutionContext) -> Result<ResourceEstimate, SynapseError> {
        Ok(self.select(context)?.estimate_resources(context))
    }
}

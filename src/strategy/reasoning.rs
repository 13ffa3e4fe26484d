//! Multi-phase reasoning strategy: Understand -> Plan -> Execute ->
//! Validate, one model call per phase.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{ResourceEstimate, Strategy};
use crate::providers::{LanguageModel, Message, ModelRequestConfig};
use crate::types::{
    ExecutionContext, Feedback, PhaseOutcome, ResultMetadata, StepConfig, StrategyResult,
    StrategyType,
};

const PHASES: &[&str] = &["understand", "plan", "execute", "validate"];

/// Confidence assigned to a phase whose model call failed.
const DEGRADED_CONFIDENCE: f32 = 0.3;

pub struct ReasoningStrategy {
    model: Arc<dyn LanguageModel>,
}

impl ReasoningStrategy {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    fn phase_messages(
        &self,
        phase: &str,
        context: &ExecutionContext,
        prior: &[(String, String)],
    ) -> Vec<Message> {
        let instruction = match phase {
            "understand" => "Restate the task and identify what the inputs provide.",
            "plan" => "Produce a short ordered plan for completing the task.",
            "execute" => "Carry out the plan and produce the final output.",
            _ => "Check the output against the task and note any problems.",
        };

        let mut prompt = format!(
            "Step type: {}\nInputs: {}\n\n{}",
            context.step_type, context.inputs, instruction
        );
        for (name, output) in prior {
            prompt.push_str(&format!("\n\n[{}]\n{}", name, output));
        }

        vec![
            Message::system("You are one phase of a multi-phase reasoning pipeline."),
            Message::user(prompt),
        ]
    }
}

/// Splits the step's token allowance evenly across phases, never
/// handing a phase a zero budget.
fn phase_token_budget(max_tokens: u32) -> u32 {
    (max_tokens / PHASES.len() as u32).max(1)
}

#[async_trait]
impl Strategy for ReasoningStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Reasoning
    }

    fn name(&self) -> &str {
        "reasoning"
    }

    fn can_handle(&self, step_type: &str, _config: &StepConfig) -> bool {
        // Anything analytical that is not pure computation.
        step_type.starts_with("analyze_")
            || step_type.starts_with("plan_")
            || step_type.starts_with("evaluate_")
            || step_type.starts_with("reason_")
    }

    async fn execute(&self, context: &ExecutionContext) -> StrategyResult {
        let request_config = ModelRequestConfig {
            max_tokens: phase_token_budget(context.constraints.max_tokens),
            ..ModelRequestConfig::default()
        };

        let mut outcomes: Vec<PhaseOutcome> = Vec::with_capacity(PHASES.len());
        let mut issues: Vec<String> = Vec::new();
        let mut prior: Vec<(String, String)> = Vec::new();
        let mut execute_output: Option<String> = None;
        let mut tokens_total = 0;

        for phase in PHASES {
            let messages = self.phase_messages(phase, context, &prior);
            match self.model.execute_request(messages, &request_config).await {
                Ok(response) => {
                    tokens_total += response.tokens_used;
                    outcomes.push(PhaseOutcome {
                        phase: phase.to_string(),
                        succeeded: true,
                        confidence: response.confidence,
                        tokens_used: response.tokens_used,
                    });
                    if *phase == "execute" {
                        execute_output = Some(response.content.clone());
                    }
                    prior.push((phase.to_string(), response.content));
                }
                // The pipeline keeps going with degraded confidence;
                // weakest-link scoring below will reflect the miss.
                Err(e) => {
                    log::warn!("reasoning phase '{}' failed: {}", phase, e);
                    issues.push(format!("{} phase failed: {}", phase, e));
                    outcomes.push(PhaseOutcome {
                        phase: phase.to_string(),
                        succeeded: false,
                        confidence: DEGRADED_CONFIDENCE,
                        tokens_used: 0,
                    });
                }
            }
        }

        let confidence = outcomes
            .iter()
            .map(|o| o.confidence)
            .fold(f32::INFINITY, f32::min);
        let confidence = if confidence.is_finite() { confidence } else { 0.0 };

        let success = execute_output.is_some();
        let result = match &execute_output {
            Some(output) => json!({ "output": output }),
            None => Value::Null,
        };

        StrategyResult {
            success,
            result,
            metadata: ResultMetadata {
                strategy_type: StrategyType::Reasoning,
                confidence,
                tokens_used: tokens_total,
                phases: Some(outcomes),
            },
            feedback: if issues.is_empty() {
                None
            } else {
                Some(Feedback { issues })
            },
        }
    }

    fn estimate_resources(&self, context: &ExecutionContext) -> ResourceEstimate {
        let tokens = context.constraints.max_tokens.min(600) * PHASES.len() as u32;
        ResourceEstimate {
            tokens,
            api_calls: PHASES.len() as u32,
            compute_time_ms: 1_500 * PHASES.len() as u64,
            cost: tokens as f64 * 0.00001,
        }
    }
}

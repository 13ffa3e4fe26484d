//! Free-form generation strategy: one model call, and always a reply.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use super::{ResourceEstimate, Strategy};
use crate::providers::{LanguageModel, Message, ModelRequestConfig};
use crate::types::{
    ExecutionContext, Feedback, ResultMetadata, StepConfig, StrategyResult, StrategyType,
};

/// Confidence of the canned fallback reply.
const FALLBACK_CONFIDENCE: f32 = 0.3;

const FALLBACK_REPLY: &str =
    "I'm sorry, I wasn't able to produce a full answer just now. Could you try again?";

pub struct ConversationalStrategy {
    model: Arc<dyn LanguageModel>,
}

impl ConversationalStrategy {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Strategy for ConversationalStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Conversational
    }

    fn name(&self) -> &str {
        "conversational"
    }

    fn can_handle(&self, _step_type: &str, _config: &StepConfig) -> bool {
        // Catch-all: a conversational context can always produce a reply.
        true
    }

    async fn execute(&self, context: &ExecutionContext) -> StrategyResult {
        let prompt = context
            .inputs
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Respond to step '{}': {}", context.step_type, context.inputs));

        let request_config = ModelRequestConfig {
            max_tokens: context.constraints.max_tokens,
            ..ModelRequestConfig::default()
        };

        let messages = vec![
            Message::system("You are a helpful conversational participant."),
            Message::user(prompt),
        ];

        match self.model.execute_request(messages, &request_config).await {
            Ok(response) => StrategyResult {
                success: true,
                result: json!({ "reply": response.content }),
                metadata: ResultMetadata {
                    strategy_type: StrategyType::Conversational,
                    confidence: response.confidence,
                    tokens_used: response.tokens_used,
                    phases: None,
                },
                feedback: None,
            },
            // A conversational context must always produce some reply,
            // so the failure becomes a low-confidence canned response.
            Err(e) => {
                log::warn!("conversational model call failed: {}", e);
                StrategyResult {
                    success: true,
                    result: json!({ "reply": FALLBACK_REPLY }),
                    metadata: ResultMetadata {
                        strategy_type: StrategyType::Conversational,
                        confidence: FALLBACK_CONFIDENCE,
                        tokens_used: 0,
                        phases: None,
                    },
                    feedback: Some(Feedback {
                        issues: vec![format!("model call failed, used fallback reply: {}", e)],
                    }),
                }
            }
        }
    }

    fn estimate_resources(&self, context: &ExecutionContext) -> ResourceEstimate {
        let tokens = context.constraints.max_tokens.min(1_000);
        ResourceEstimate {
            tokens,
            api_calls: 1,
            compute_time_ms: 1_500,
            cost: tokens as f64 * 0.00001,
        }
    }
}

//! Pure-computation strategy: no model calls, no tokens, synchronous
//! relative to its own inputs.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{ResourceEstimate, Strategy};
use crate::types::{
    ExecutionContext, Feedback, ResultMetadata, StepConfig, StrategyResult, StrategyType,
};

const HANDLED_STEP_TYPES: &[&str] = &[
    "calculate_sum",
    "calculate_average",
    "calculate_min",
    "calculate_max",
    "count_items",
    "extract_field",
];

pub struct DeterministicStrategy;

impl DeterministicStrategy {
    pub fn new() -> Self {
        Self
    }

    fn run(&self, context: &ExecutionContext) -> Result<Value, String> {
        match context.step_type.as_str() {
            "calculate_sum" => {
                let numbers = parse_numbers(&context.inputs)?;
                Ok(json!({ "sum": numbers.iter().sum::<f64>() }))
            }
            "calculate_average" => {
                let numbers = parse_numbers(&context.inputs)?;
                if numbers.is_empty() {
                    return Err("cannot average an empty list".to_string());
                }
                let avg = numbers.iter().sum::<f64>() / numbers.len() as f64;
                Ok(json!({ "average": avg }))
            }
            "calculate_min" => {
                let numbers = parse_numbers(&context.inputs)?;
                numbers
                    .into_iter()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |m| m.min(n))))
                    .map(|min| json!({ "min": min }))
                    .ok_or_else(|| "cannot take min of an empty list".to_string())
            }
            "calculate_max" => {
                let numbers = parse_numbers(&context.inputs)?;
                numbers
                    .into_iter()
                    .fold(None::<f64>, |acc, n| Some(acc.map_or(n, |m| m.max(n))))
                    .map(|max| json!({ "max": max }))
                    .ok_or_else(|| "cannot take max of an empty list".to_string())
            }
            "count_items" => {
                let items = context
                    .inputs
                    .get("items")
                    .and_then(|v| v.as_array())
                    .ok_or_else(|| "inputs.items must be an array".to_string())?;
                Ok(json!({ "count": items.len() }))
            }
            "extract_field" => {
                let field = context
                    .inputs
                    .get("field")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "inputs.field must be a string".to_string())?;
                let value = context
                    .inputs
                    .get("source")
                    .and_then(|v| v.get(field))
                    .cloned()
                    .ok_or_else(|| format!("field '{}' not present in source", field))?;
                Ok(json!({ "value": value }))
            }
            other => Err(format!("unsupported step type '{}'", other)),
        }
    }
}

impl Default for DeterministicStrategy {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_numbers(inputs: &Value) -> Result<Vec<f64>, String> {
    inputs
        .get("numbers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "inputs.numbers must be an array".to_string())?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| "inputs.numbers must be numeric".to_string()))
        .collect()
}

#[async_trait]
impl Strategy for DeterministicStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Deterministic
    }

    fn name(&self) -> &str {
        "deterministic"
    }

    fn can_handle(&self, step_type: &str, _config: &StepConfig) -> bool {
        HANDLED_STEP_TYPES.contains(&step_type)
    }

    async fn execute(&self, context: &ExecutionContext) -> StrategyResult {
        match self.run(context) {
            Ok(result) => StrategyResult {
                success: true,
                result,
                metadata: ResultMetadata {
                    strategy_type: StrategyType::Deterministic,
                    confidence: 1.0,
                    tokens_used: 0,
                    phases: None,
                },
                feedback: None,
            },
            // No partial credit: failures carry nothing but the issue.
            Err(issue) => StrategyResult {
                success: false,
                result: Value::Null,
                metadata: ResultMetadata {
                    strategy_type: StrategyType::Deterministic,
                    confidence: 0.0,
                    tokens_used: 0,
                    phases: None,
                },
                feedback: Some(Feedback {
                    issues: vec![issue],
                }),
            },
        }
    }

    fn estimate_resources(&self, _context: &ExecutionContext) -> ResourceEstimate {
        ResourceEstimate {
            tokens: 0,
            api_calls: 0,
            compute_time_ms: 5,
            cost: 0.0,
        }
    }
}

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequestConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub confidence: f32,
    pub tokens_used: u32,
    pub reasoning: Option<String>,
}

/// The language-model call contract. Failures are ordinary `Err`
/// returns; callers decide how to degrade.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn execute_request(
        &self,
        messages: Vec<Message>,
        config: &ModelRequestConfig,
    ) -> Result<ModelResponse>;
}

/// Generic HTTP completion endpoint speaking a chat-style JSON protocol.
#[derive(Debug, Clone)]
pub struct HttpModelProvider {
    base_url: String,
    api_key: Option<String>,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    tokens_used: Option<u32>,
    #[serde(default)]
    reasoning: Option<String>,
}

impl HttpModelProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

#[async_trait]
impl LanguageModel for HttpModelProvider {
    async fn execute_request(
        &self,
        messages: Vec<Message>,
        config: &ModelRequestConfig,
    ) -> Result<ModelResponse> {
        let request = CompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/complete", self.base_url))
            .header("content-type", "application/json")
            .json(&request);

        if let Some(key) = &self.api_key {
            builder = builder.header("authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            anyhow::bail!("model endpoint error {}: {}", status, body);
        }

        let result: CompletionResponse = response.json().await?;
        Ok(ModelResponse {
            content: result.content,
            confidence: result.confidence.unwrap_or(0.8),
            tokens_used: result.tokens_used.unwrap_or(0),
            reasoning: result.reasoning,
        })
    }
}

/// Scriptable model for tests: queued outcomes are consumed per call,
/// then the default response repeats.
pub struct MockModel {
    outcomes: Mutex<VecDeque<Result<ModelResponse, String>>>,
    default_response: ModelResponse,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            default_response: ModelResponse {
                content: "mock response".to_string(),
                confidence: 0.9,
                tokens_used: 50,
                reasoning: None,
            },
        }
    }

    pub fn with_response(content: impl Into<String>, confidence: f32) -> Self {
        let mut mock = Self::new();
        mock.default_response = ModelResponse {
            content: content.into(),
            confidence,
            tokens_used: 50,
            reasoning: None,
        };
        mock
    }

    pub fn push_ok(&self, content: impl Into<String>, confidence: f32) {
        self.outcomes.lock().unwrap().push_back(Ok(ModelResponse {
            content: content.into(),
            confidence,
            tokens_used: 50,
            reasoning: None,
        }));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn execute_request(
        &self,
        _messages: Vec<Message>,
        _config: &ModelRequestConfig,
    ) -> Result<ModelResponse> {
        let queued = self.outcomes.lock().unwrap().pop_front();
        match queued {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}

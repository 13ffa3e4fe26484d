//! Language-model endpoint tracked as a resource, so strategies can ask
//! the registry whether generation is currently usable.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::{HealthCheck, Resource, ResourceEvent, ResourceInfo};
use crate::providers::{LanguageModel, Message, ModelRequestConfig};
use crate::types::ResourceStatus;

pub struct ModelEndpointResource {
    id: String,
    model: Arc<dyn LanguageModel>,
    info: Mutex<ResourceInfo>,
    last_healthy: Mutex<Option<bool>>,
    events: Mutex<Option<mpsc::Sender<ResourceEvent>>>,
}

impl ModelEndpointResource {
    pub fn new(id: impl Into<String>, model: Arc<dyn LanguageModel>) -> Self {
        let id = id.into();
        Self {
            info: Mutex::new(ResourceInfo::new(id.clone(), "model")),
            id,
            model,
            last_healthy: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    async fn ping(&self) -> Result<()> {
        let config = ModelRequestConfig {
            max_tokens: 8,
            temperature: 0.0,
        };
        self.model
            .execute_request(vec![Message::user("ping")], &config)
            .await?;
        Ok(())
    }

    /// Emits `HealthChanged` when the health flag flips between checks.
    fn record_health(&self, healthy: bool) {
        let previous = self.last_healthy.lock().unwrap().replace(healthy);
        if previous.is_none() || previous == Some(healthy) {
            return;
        }
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(ResourceEvent::HealthChanged {
                id: self.id.clone(),
                healthy,
            });
        }
    }

    fn set_status(&self, status: ResourceStatus) {
        let previous = {
            let mut info = self.info.lock().unwrap();
            let previous = info.status;
            info.status = status;
            previous
        };
        if previous == status {
            return;
        }

        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let event = match status {
                ResourceStatus::Available => ResourceEvent::Discovered {
                    id: self.id.clone(),
                },
                ResourceStatus::Unavailable => ResourceEvent::Lost {
                    id: self.id.clone(),
                },
                _ => return,
            };
            let _ = sender.try_send(event);
        }
    }
}

#[async_trait]
impl Resource for ModelEndpointResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        "model"
    }

    fn info(&self) -> ResourceInfo {
        self.info.lock().unwrap().clone()
    }

    async fn initialize(&self, events: mpsc::Sender<ResourceEvent>) -> Result<()> {
        *self.events.lock().unwrap() = Some(events);
        self.info.lock().unwrap().status = ResourceStatus::Discovering;
        Ok(())
    }

    async fn discover(&self) -> Result<bool> {
        match self.ping().await {
            Ok(()) => {
                self.set_status(ResourceStatus::Available);
                Ok(true)
            }
            Err(e) => {
                log::warn!("model endpoint '{}' unreachable: {}", self.id, e);
                self.set_status(ResourceStatus::Unavailable);
                Ok(false)
            }
        }
    }

    async fn health_check(&self) -> HealthCheck {
        let (healthy, message) = match self.ping().await {
            Ok(()) => (true, "model responding".to_string()),
            Err(e) => (false, format!("model call failed: {}", e)),
        };

        {
            let mut info = self.info.lock().unwrap();
            info.last_health_check = Some(Utc::now());
        }
        self.set_status(if healthy {
            ResourceStatus::Available
        } else {
            ResourceStatus::Unavailable
        });
        self.record_health(healthy);

        HealthCheck {
            healthy,
            message,
            details: json!({ "id": self.id }),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        *self.last_healthy.lock().unwrap() = None;
        *self.events.lock().unwrap() = None;
        self.info.lock().unwrap().status = ResourceStatus::Unknown;
        Ok(())
    }
}

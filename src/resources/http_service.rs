//! HTTP-reachable external service tracked as a resource.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::{HealthCheck, Resource, ResourceEvent, ResourceInfo};
use crate::types::ResourceStatus;

/// Facts advertised by the probed service, cached for a bounded TTL so
/// availability queries do not re-probe on every call.
#[derive(Debug, Clone, Default, Deserialize)]
struct ProbeFacts {
    #[serde(default)]
    participants: Option<u32>,
    #[serde(default)]
    capabilities: Option<u32>,
}

pub struct HttpServiceResource {
    id: String,
    category: String,
    base_url: String,
    client: reqwest::Client,
    info: Mutex<ResourceInfo>,
    probe_cache: Mutex<Option<(ProbeFacts, Instant)>>,
    probe_ttl: Duration,
    last_healthy: Mutex<Option<bool>>,
    events: Mutex<Option<mpsc::Sender<ResourceEvent>>>,
}

impl HttpServiceResource {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let category = category.into();
        Self {
            info: Mutex::new(ResourceInfo::new(id.clone(), category.clone())),
            id,
            category,
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            probe_cache: Mutex::new(None),
            probe_ttl: Duration::from_secs(60),
            last_healthy: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    pub fn with_probe_ttl(mut self, ttl: Duration) -> Self {
        self.probe_ttl = ttl;
        self
    }

    fn set_status(&self, status: ResourceStatus) {
        let previous = {
            let mut info = self.info.lock().unwrap();
            let previous = info.status;
            info.status = status;
            previous
        };

        // Notify the registry only on actual transitions.
        if previous == status {
            return;
        }
        let sender = self.events.lock().unwrap().clone();
        if let Some(sender) = sender {
            let event = match status {
                ResourceStatus::Available => ResourceEvent::Discovered {
                    id: self.id.clone(),
                },
                ResourceStatus::Unavailable | ResourceStatus::Error => ResourceEvent::Lost {
                    id: self.id.clone(),
                },
                _ => return,
            };
            let _ = sender.try_send(event);
        }
    }

    /// Emits `HealthChanged` when the health flag flips between checks.
    /// The first observation sets the baseline without an event.
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

    async fn probe(&self) -> Result<ProbeFacts> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("health endpoint returned {}", response.status());
        }

        // Body facts are optional; an empty or non-JSON body still
        // counts as reachable.
        Ok(response.json::<ProbeFacts>().await.unwrap_or_default())
    }
}

#[async_trait]
impl Resource for HttpServiceResource {
    fn id(&self) -> &str {
        &self.id
    }

    fn category(&self) -> &str {
        &self.category
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
        if let Some((_, probed_at)) = self.probe_cache.lock().unwrap().as_ref() {
            if probed_at.elapsed() < self.probe_ttl {
                return Ok(self.info.lock().unwrap().status == ResourceStatus::Available);
            }
        }

        match self.probe().await {
            Ok(facts) => {
                self.info.lock().unwrap().metadata = json!({
                    "participants": facts.participants,
                    "capabilities": facts.capabilities,
                });
                *self.probe_cache.lock().unwrap() = Some((facts, Instant::now()));
                self.set_status(ResourceStatus::Available);
                Ok(true)
            }
            Err(e) => {
                log::warn!("probe of '{}' failed: {}", self.id, e);
                *self.probe_cache.lock().unwrap() = Some((ProbeFacts::default(), Instant::now()));
                self.set_status(ResourceStatus::Unavailable);
                Ok(false)
            }
        }
    }

    async fn health_check(&self) -> HealthCheck {
        let (healthy, message) = match self.probe().await {
            Ok(_) => (true, "reachable".to_string()),
            Err(e) => (false, format!("unreachable: {}", e)),
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
            details: json!({ "base_url": self.base_url }),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        *self.probe_cache.lock().unwrap() = None;
        *self.last_healthy.lock().unwrap() = None;
        *self.events.lock().unwrap() = None;
        self.info.lock().unwrap().status = ResourceStatus::Unknown;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_caches_unreachable_result() {
        // Nothing listens here; the first probe fails and the cached
        // fact short-circuits the second call.
        let resource = HttpServiceResource::new("svc", "http", "http://127.0.0.1:9")
            .with_probe_ttl(Duration::from_secs(300));
        let (tx, _rx) = mpsc::channel(8);
        resource.initialize(tx).await.unwrap();

        assert!(!resource.discover().await.unwrap());
        assert_eq!(resource.info().status, ResourceStatus::Unavailable);

        assert!(!resource.discover().await.unwrap());
    }

    #[tokio::test]
    async fn test_status_transition_emits_event() {
        let resource = HttpServiceResource::new("svc", "http", "http://127.0.0.1:9");
        let (tx, mut rx) = mpsc::channel(8);
        resource.initialize(tx).await.unwrap();

        resource.set_status(ResourceStatus::Available);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ResourceEvent::Discovered { id } if id == "svc"));

        // No transition, no event.
        resource.set_status(ResourceStatus::Available);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_health_flip_emits_health_changed() {
        let resource = HttpServiceResource::new("svc", "http", "http://127.0.0.1:9");
        let (tx, mut rx) = mpsc::channel(8);
        resource.initialize(tx).await.unwrap();

        // First observation is the baseline, not a flip.
        resource.record_health(true);
        assert!(rx.try_recv().is_err());

        resource.record_health(false);
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            ResourceEvent::HealthChanged { healthy: false, ref id } if id == "svc"
        ));

        // Repeating the same outcome is not a flip.
        resource.record_health(false);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_resets_state() {
        let resource = HttpServiceResource::new("svc", "http", "http://127.0.0.1:9");
        let (tx, _rx) = mpsc::channel(8);
        resource.initialize(tx).await.unwrap();

        resource.shutdown().await.unwrap();
        assert_eq!(resource.info().status, ResourceStatus::Unknown);
    }
}

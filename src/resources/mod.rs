pub mod http_service;
pub mod model_endpoint;
pub mod registry;

pub use http_service::HttpServiceResource;
pub use model_endpoint::ModelEndpointResource;
pub use registry::{ResourceRegistration, ResourceRegistry};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::types::ResourceStatus;

/// Snapshot of a resource's identity and current availability. Owned
/// and mutated only by the resource itself; consumers read copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub category: String,
    pub status: ResourceStatus,
    pub last_health_check: Option<DateTime<Utc>>,
    pub metadata: Value,
}

impl ResourceInfo {
    pub fn new(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            status: ResourceStatus::Unknown,
            last_health_check: None,
            metadata: Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub healthy: bool,
    pub message: String,
    pub details: Value,
}

/// Lifecycle notification a resource sends to its registry over the
/// channel handed to it at initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResourceEvent {
    Discovered { id: String },
    Lost { id: String },
    HealthChanged { id: String, healthy: bool },
}

/// An external capability tracked by the registry.
///
/// `discover` is a best-effort reachability probe and must tolerate
/// partial failure; implementations cache discovered facts for a
/// bounded TTL so repeated calls do not re-probe.
#[async_trait]
pub trait Resource: Send + Sync {
    fn id(&self) -> &str;
    fn category(&self) -> &str;
    fn info(&self) -> ResourceInfo;
    async fn initialize(&self, events: mpsc::Sender<ResourceEvent>) -> Result<()>;
    async fn discover(&self) -> Result<bool>;
    async fn health_check(&self) -> HealthCheck;
    async fn shutdown(&self) -> Result<()>;
}

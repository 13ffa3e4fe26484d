//! Process-wide resource registry: discovery, health checks, and
//! availability queries over registered external capabilities.
//!
//! One registry is constructed at process start and passed by handle to
//! every consumer; tests construct a fresh instance each.

use anyhow::Result;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use super::{Resource, ResourceEvent, ResourceInfo};
use crate::config::RegistryConfig;
use crate::error::SynapseError;
use crate::types::ResourceStatus;

pub type ResourceConstructor = Box<dyn Fn() -> Arc<dyn Resource> + Send + Sync>;

/// A resource made known to the registry before `initialize`. The
/// constructor supports late instantiation: it only runs if the
/// category is enabled in configuration.
pub struct ResourceRegistration {
    pub id: String,
    pub category: String,
    pub constructor: ResourceConstructor,
}

impl ResourceRegistration {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        constructor: impl Fn() -> Arc<dyn Resource> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            constructor: Box::new(constructor),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceHealth {
    pub id: String,
    pub category: String,
    pub enabled: bool,
    pub status: ResourceStatus,
    pub healthy: bool,
    pub message: String,
}

/// Consolidated health view combining per-resource status with which
/// categories configuration enables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub healthy: bool,
    pub resources: Vec<ResourceHealth>,
}

pub struct ResourceRegistry {
    registrations: Mutex<Vec<ResourceRegistration>>,
    resources: RwLock<HashMap<String, Arc<dyn Resource>>>,
    config: Mutex<Option<RegistryConfig>>,
    initialized: AtomicBool,
    events: broadcast::Sender<ResourceEvent>,
    discovery_task: Mutex<Option<JoinHandle<()>>>,
    forward_task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            registrations: Mutex::new(Vec::new()),
            resources: RwLock::new(HashMap::new()),
            config: Mutex::new(None),
            initialized: AtomicBool::new(false),
            events,
            discovery_task: Mutex::new(None),
            forward_task: Mutex::new(None),
        }
    }

    /// Registers a resource constructor. Call before `initialize`;
    /// registration order does not matter.
    pub fn register(&self, registration: ResourceRegistration) {
        self.registrations.lock().unwrap().push(registration);
    }

    /// Subscribes to registry-wide resource lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// Loads configuration, instantiates resources for enabled
    /// categories, wires their lifecycle channels, and starts periodic
    /// discovery if enabled. Calling it a second time is a no-op.
    pub async fn initialize(self: &Arc<Self>, config: RegistryConfig) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            log::warn!("resource registry already initialized, ignoring re-initialization");
            return Ok(());
        }

        *self.config.lock().unwrap() = Some(config.clone());

        let (tx, rx) = mpsc::channel::<ResourceEvent>(64);

        // Re-emit each resource's lifecycle notifications registry-wide.
        let broadcast_tx = self.events.clone();
        let forward = tokio::spawn(async move {
            let mut rx = rx;
            while let Some(event) = rx.recv().await {
                let _ = broadcast_tx.send(event);
            }
        });
        *self.forward_task.lock().unwrap() = Some(forward);

        // Instantiate outside the registration lock so nothing is held
        // across the per-resource initialization awaits.
        let registrations: Vec<ResourceRegistration> =
            self.registrations.lock().unwrap().drain(..).collect();

        let mut instantiated: HashMap<String, Arc<dyn Resource>> = HashMap::new();
        for registration in &registrations {
            if !config.is_category_enabled(&registration.category) {
                log::debug!(
                    "resource '{}' skipped, category '{}' disabled",
                    registration.id,
                    registration.category
                );
                continue;
            }

            let resource = (registration.constructor)();
            if let Err(e) = resource.initialize(tx.clone()).await {
                log::warn!("resource '{}' failed to initialize: {}", registration.id, e);
            }
            instantiated.insert(registration.id.clone(), resource);
        }
        self.resources.write().await.extend(instantiated);
        self.registrations.lock().unwrap().extend(registrations);

        if config.discovery.enabled {
            let registry = Arc::clone(self);
            let interval = Duration::from_secs(config.discovery.interval_secs.max(1));
            let task = tokio::spawn(async move {
                // Immediate pass, then the periodic scan.
                registry.run_discovery().await;
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    registry.run_discovery().await;
                }
            });
            *self.discovery_task.lock().unwrap() = Some(task);
        }

        Ok(())
    }

    /// One discovery pass over all resources. Failures are logged and
    /// mean "currently unavailable", never fatal.
    pub async fn run_discovery(&self) {
        let resources: Vec<Arc<dyn Resource>> =
            self.resources.read().await.values().cloned().collect();

        for resource in resources {
            match resource.discover().await {
                Ok(found) => {
                    log::debug!(
                        "discovery for '{}': {}",
                        resource.id(),
                        if found { "reachable" } else { "unreachable" }
                    );
                }
                Err(e) => {
                    log::warn!("discovery for '{}' failed: {}", resource.id(), e);
                }
            }
        }
    }

    pub async fn get_resource(&self, id: &str) -> Result<Arc<dyn Resource>, SynapseError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SynapseError::NotInitialized);
        }
        self.resources
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SynapseError::UnknownResource(id.to_string()))
    }

    pub async fn get_all_resources(&self) -> Vec<ResourceInfo> {
        self.resources
            .read()
            .await
            .values()
            .map(|r| r.info())
            .collect()
    }

    pub async fn get_resources_by_category(&self, category: &str) -> Vec<ResourceInfo> {
        self.resources
            .read()
            .await
            .values()
            .filter(|r| r.category() == category)
            .map(|r| r.info())
            .collect()
    }

    pub async fn get_resources_by_status(&self, status: ResourceStatus) -> Vec<ResourceInfo> {
        self.resources
            .read()
            .await
            .values()
            .map(|r| r.info())
            .filter(|info| info.status == status)
            .collect()
    }

    pub async fn is_resource_available(&self, id: &str) -> bool {
        match self.resources.read().await.get(id) {
            Some(resource) => resource.info().status == ResourceStatus::Available,
            None => false,
        }
    }

    /// Ids of currently-available resources, the set strategies and
    /// behaviors consult for usable tools.
    pub async fn available_resources(&self) -> Vec<String> {
        self.resources
            .read()
            .await
            .values()
            .filter(|r| r.info().status == ResourceStatus::Available)
            .map(|r| r.id().to_string())
            .collect()
    }

    /// Runs health checks concurrently across all resources and folds
    /// in the enabled flags from configuration.
    pub async fn health_summary(&self) -> HealthSummary {
        let resources: Vec<Arc<dyn Resource>> =
            self.resources.read().await.values().cloned().collect();
        let config = self.config.lock().unwrap().clone();

        let checks = join_all(resources.iter().map(|r| r.health_check())).await;

        let entries: Vec<ResourceHealth> = resources
            .iter()
            .zip(checks)
            .map(|(resource, check)| {
                let info = resource.info();
                let enabled = config
                    .as_ref()
                    .map(|c| c.is_category_enabled(resource.category()))
                    .unwrap_or(false);
                ResourceHealth {
                    id: info.id,
                    category: info.category,
                    enabled,
                    status: info.status,
                    healthy: check.healthy,
                    message: check.message,
                }
            })
            .collect();

        HealthSummary {
            healthy: entries.iter().all(|e| e.healthy || !e.enabled),
            resources: entries,
        }
    }

    /// Cancels discovery, shuts every resource down best-effort, and
    /// clears registry state. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(task) = self.discovery_task.lock().unwrap().take() {
            task.abort();
        }
        if let Some(task) = self.forward_task.lock().unwrap().take() {
            task.abort();
        }

        let resources: Vec<Arc<dyn Resource>> =
            self.resources.write().await.drain().map(|(_, r)| r).collect();

        let mut failures = Vec::new();
        for resource in resources {
            if let Err(e) = resource.shutdown().await {
                log::error!("shutdown of resource '{}' failed: {}", resource.id(), e);
                failures.push(format!("{}: {}", resource.id(), e));
            }
        }

        *self.config.lock().unwrap() = None;

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("resource shutdown failures: {}", failures.join("; "))
        }
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::resources::HealthCheck;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    struct MockResource {
        id: String,
        category: String,
        info: Mutex<ResourceInfo>,
        reachable: bool,
        init_count: Arc<AtomicUsize>,
        shutdown_count: Arc<AtomicUsize>,
    }

    impl MockResource {
        fn new(id: &str, category: &str, reachable: bool) -> Self {
            Self {
                id: id.to_string(),
                category: category.to_string(),
                info: Mutex::new(ResourceInfo::new(id, category)),
                reachable,
                init_count: Arc::new(AtomicUsize::new(0)),
                shutdown_count: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Resource for MockResource {
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
            self.init_count.fetch_add(1, Ordering::SeqCst);
            let status = if self.reachable {
                ResourceStatus::Available
            } else {
                ResourceStatus::Unavailable
            };
            self.info.lock().unwrap().status = status;
            if self.reachable {
                let _ = events
                    .send(ResourceEvent::Discovered {
                        id: self.id.clone(),
                    })
                    .await;
            }
            Ok(())
        }

        async fn discover(&self) -> Result<bool> {
            Ok(self.reachable)
        }

        async fn health_check(&self) -> HealthCheck {
            HealthCheck {
                healthy: self.reachable,
                message: if self.reachable { "ok" } else { "unreachable" }.to_string(),
                details: json!({}),
            }
        }

        async fn shutdown(&self) -> Result<()> {
            self.shutdown_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> RegistryConfig {
        RegistryConfig {
            discovery: DiscoveryConfig {
                enabled: false,
                interval_secs: 3600,
            },
            ..RegistryConfig::default()
        }
        .with_category("tool", true)
    }

    #[tokio::test]
    async fn test_initialize_instantiates_enabled_categories_only() {
        let registry = Arc::new(ResourceRegistry::new());
        let enabled_count = Arc::new(AtomicUsize::new(0));
        let disabled_count = Arc::new(AtomicUsize::new(0));

        let counter = enabled_count.clone();
        registry.register(ResourceRegistration::new("a", "tool", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MockResource::new("a", "tool", true))
        }));
        let counter = disabled_count.clone();
        registry.register(ResourceRegistration::new("b", "disabled-cat", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MockResource::new("b", "disabled-cat", true))
        }));

        registry.initialize(test_config()).await.unwrap();

        assert_eq!(enabled_count.load(Ordering::SeqCst), 1);
        assert_eq!(disabled_count.load(Ordering::SeqCst), 0);
        assert!(registry.get_resource("a").await.is_ok());
        assert!(registry.get_resource("b").await.is_err());
    }

    #[tokio::test]
    async fn test_double_initialize_is_noop() {
        let registry = Arc::new(ResourceRegistry::new());
        let construct_count = Arc::new(AtomicUsize::new(0));

        let counter = construct_count.clone();
        registry.register(ResourceRegistration::new("a", "tool", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(MockResource::new("a", "tool", true))
        }));

        registry.initialize(test_config()).await.unwrap();
        registry.initialize(test_config()).await.unwrap();

        assert_eq!(construct_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_events_re_emitted() {
        let registry = Arc::new(ResourceRegistry::new());
        registry.register(ResourceRegistration::new("a", "tool", || {
            Arc::new(MockResource::new("a", "tool", true))
        }));

        let mut events = registry.subscribe();
        registry.initialize(test_config()).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, ResourceEvent::Discovered { id } if id == "a"));
    }

    #[tokio::test]
    async fn test_queries_and_availability() {
        let registry = Arc::new(ResourceRegistry::new());
        registry.register(ResourceRegistration::new("up", "tool", || {
            Arc::new(MockResource::new("up", "tool", true))
        }));
        registry.register(ResourceRegistration::new("down", "tool", || {
            Arc::new(MockResource::new("down", "tool", false))
        }));

        registry.initialize(test_config()).await.unwrap();

        assert!(registry.is_resource_available("up").await);
        assert!(!registry.is_resource_available("down").await);
        assert!(!registry.is_resource_available("missing").await);

        assert_eq!(registry.get_resources_by_category("tool").await.len(), 2);
        assert_eq!(
            registry
                .get_resources_by_status(ResourceStatus::Available)
                .await
                .len(),
            1
        );
        assert_eq!(registry.available_resources().await, vec!["up"]);
    }

    #[tokio::test]
    async fn test_health_summary_degrades_without_blocking_others() {
        let registry = Arc::new(ResourceRegistry::new());
        registry.register(ResourceRegistration::new("up", "tool", || {
            Arc::new(MockResource::new("up", "tool", true))
        }));
        registry.register(ResourceRegistration::new("down", "tool", || {
            Arc::new(MockResource::new("down", "tool", false))
        }));

        registry.initialize(test_config()).await.unwrap();

        let summary = registry.health_summary().await;
        assert!(!summary.healthy);
        assert_eq!(summary.resources.len(), 2);
        let up = summary.resources.iter().find(|r| r.id == "up").unwrap();
        assert!(up.healthy && up.enabled);
    }

    #[tokio::test]
    async fn test_shutdown_idempotent_and_clears_state() {
        let registry = Arc::new(ResourceRegistry::new());
        registry.register(ResourceRegistration::new("a", "tool", || {
            Arc::new(MockResource::new("a", "tool", true))
        }));

        registry.initialize(test_config()).await.unwrap();
        registry.shutdown().await.unwrap();
        assert!(registry.get_all_resources().await.is_empty());

        // Second shutdown finds nothing to do.
        registry.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_uninitialized_registry_rejects_lookup() {
        let registry = ResourceRegistry::new();
        assert!(matches!(
            registry.get_resource("a").await,
            Err(SynapseError::NotInitialized)
        ));
    }
}

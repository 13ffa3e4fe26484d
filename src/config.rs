use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::engine::decision::DecisionConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub arbitration: DecisionConfig,
    #[serde(default)]
    pub resources: RegistryConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Category name to enabled flag; absent categories are disabled.
    #[serde(default)]
    pub categories: HashMap<String, bool>,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl RegistryConfig {
    pub fn with_category(mut self, category: impl Into<String>, enabled: bool) -> Self {
        self.categories.insert(category.into(), enabled);
        self
    }

    pub fn is_category_enabled(&self, category: &str) -> bool {
        self.categories.get(category).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub flush_batch_size: usize,
    pub flush_interval_secs: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            flush_batch_size: 16,
            flush_interval_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.model.base_url = std::env::var("SYNAPSE_MODEL_URL").ok();
        config.model.api_key = std::env::var("SYNAPSE_MODEL_API_KEY").ok();
        if let Ok(model) = std::env::var("SYNAPSE_MODEL") {
            config.model.model = model;
        }
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading config file {}", path.as_ref().display()))?;
        toml::from_str(&raw).context("parsing config file")
    }
}

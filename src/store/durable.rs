use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{BackingStore, StateStore};

/// State store persisted straight through to a backing namespace, keyed
/// by a fixed prefix per logical store. TTLs are not honored by this
/// variant; the backing namespace owns retention.
pub struct DurableStore {
    backing: Arc<dyn BackingStore>,
    prefix: String,
}

impl DurableStore {
    pub fn new(backing: Arc<dyn BackingStore>, prefix: impl Into<String>) -> Self {
        Self {
            backing,
            prefix: prefix.into(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }
}

#[async_trait]
impl StateStore for DurableStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.backing.get(&self.scoped(key)).await
    }

    async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) -> Result<()> {
        self.backing.set(&self.scoped(key), value).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.backing.delete(&self.scoped(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.backing.exists(&self.scoped(key)).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let scope = format!("{}:", self.prefix);
        Ok(self
            .backing
            .get_all(&scope)
            .await?
            .into_keys()
            .map(|k| k.strip_prefix(&scope).map(str::to_string).unwrap_or(k))
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.backing.clear(&format!("{}:", self.prefix)).await
    }
}

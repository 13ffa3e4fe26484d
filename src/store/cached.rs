use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::traits::{BackingStore, StateStore};

#[derive(Debug, Clone)]
pub struct CachedStoreConfig {
    pub prefix: String,
    /// Dirty-set size that triggers an immediate flush.
    pub flush_batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for CachedStoreConfig {
    fn default() -> Self {
        Self {
            prefix: "state".to_string(),
            flush_batch_size: 16,
            flush_interval: Duration::from_secs(30),
        }
    }
}

impl CachedStoreConfig {
    pub fn from_settings(prefix: impl Into<String>, settings: &crate::config::StoreSettings) -> Self {
        Self {
            prefix: prefix.into(),
            flush_batch_size: settings.flush_batch_size,
            flush_interval: Duration::from_secs(settings.flush_interval_secs),
        }
    }
}

/// Write-behind state store: writes land in an in-memory cache and a
/// dirty set, and reach the backing namespace when the dirty set hits
/// the batch size, on the periodic timer, or at shutdown.
///
/// Reads always prefer the cache, falling back to the backing store on
/// a miss and populating the cache afterward.
///
/// Like `DurableStore`, TTLs are not honored by this variant; the
/// backing namespace owns retention.
pub struct CachedStore {
    backing: Arc<dyn BackingStore>,
    prefix: String,
    cache: Arc<RwLock<HashMap<String, Value>>>,
    dirty: Arc<Mutex<HashSet<String>>>,
    batch_size: usize,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl CachedStore {
    pub fn new(backing: Arc<dyn BackingStore>, config: CachedStoreConfig) -> Self {
        let cache: Arc<RwLock<HashMap<String, Value>>> = Arc::new(RwLock::new(HashMap::new()));
        let dirty: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

        let task = tokio::spawn(periodic_flush(
            backing.clone(),
            config.prefix.clone(),
            cache.clone(),
            dirty.clone(),
            config.flush_interval,
        ));

        Self {
            backing,
            prefix: config.prefix,
            cache,
            dirty,
            batch_size: config.flush_batch_size.max(1),
            flush_task: Mutex::new(Some(task)),
            shut_down: AtomicBool::new(false),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Pushes all dirty entries to the backing store. Entries that fail
    /// to persist stay dirty for the next attempt.
    pub async fn flush(&self) -> Result<()> {
        flush_dirty(&*self.backing, &self.prefix, &self.cache, &self.dirty).await
    }

    pub fn pending_writes(&self) -> usize {
        self.dirty.lock().unwrap().len()
    }

    /// Drains pending writes and stops the flush timer. Idempotent.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(task) = self.flush_task.lock().unwrap().take() {
            task.abort();
        }
        self.flush().await
    }
}

async fn periodic_flush(
    backing: Arc<dyn BackingStore>,
    prefix: String,
    cache: Arc<RwLock<HashMap<String, Value>>>,
    dirty: Arc<Mutex<HashSet<String>>>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ticker.tick().await; // first tick fires immediately

    loop {
        ticker.tick().await;
        if let Err(e) = flush_dirty(&*backing, &prefix, &cache, &dirty).await {
            log::warn!("periodic state flush failed: {}", e);
        }
    }
}

async fn flush_dirty(
    backing: &dyn BackingStore,
    prefix: &str,
    cache: &RwLock<HashMap<String, Value>>,
    dirty: &Mutex<HashSet<String>>,
) -> Result<()> {
    // Snapshot under the locks, write without them.
    let pending: Vec<(String, Option<Value>)> = {
        let keys: Vec<String> = dirty.lock().unwrap().drain().collect();
        let cache = cache.read().unwrap();
        keys.into_iter()
            .map(|k| {
                let value = cache.get(&k).cloned();
                (k, value)
            })
            .collect()
    };

    let mut first_error = None;
    for (key, value) in pending {
        let scoped = format!("{}:{}", prefix, key);
        let outcome = match value {
            Some(value) => backing.set(&scoped, value).await,
            None => backing.delete(&scoped).await.map(|_| ()),
        };
        if let Err(e) = outcome {
            log::warn!("flush of '{}' failed: {}", scoped, e);
            dirty.lock().unwrap().insert(key);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[async_trait]
impl StateStore for CachedStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(value) = self.cache.read().unwrap().get(key).cloned() {
            return Ok(Some(value));
        }

        let value = self.backing.get(&self.scoped(key)).await?;
        if let Some(value) = &value {
            self.cache
                .write()
                .unwrap()
                .insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) -> Result<()> {
        self.cache
            .write()
            .unwrap()
            .insert(key.to_string(), value);

        let should_flush = {
            let mut dirty = self.dirty.lock().unwrap();
            dirty.insert(key.to_string());
            dirty.len() >= self.batch_size
        };

        if should_flush {
            self.flush().await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let cached = self.cache.write().unwrap().remove(key).is_some();
        self.dirty.lock().unwrap().remove(key);
        let backed = self.backing.delete(&self.scoped(key)).await?;
        Ok(cached || backed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        if self.cache.read().unwrap().contains_key(key) {
            return Ok(true);
        }
        self.backing.exists(&self.scoped(key)).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let scope = format!("{}:", self.prefix);
        let mut keys: HashSet<String> = self
            .backing
            .get_all(&scope)
            .await?
            .into_keys()
            .map(|k| k.strip_prefix(&scope).map(str::to_string).unwrap_or(k))
            .collect();
        keys.extend(self.cache.read().unwrap().keys().cloned());
        Ok(keys.into_iter().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.write().unwrap().clear();
        self.dirty.lock().unwrap().clear();
        self.backing.clear(&format!("{}:", self.prefix)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryBackingStore;
    use serde_json::json;

    fn config(batch: usize) -> CachedStoreConfig {
        CachedStoreConfig {
            prefix: "t".to_string(),
            flush_batch_size: batch,
            // Long interval so tests control flushing themselves.
            flush_interval: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_writes_stay_cached_until_batch() {
        let backing = Arc::new(MemoryBackingStore::new());
        let store = CachedStore::new(backing.clone(), config(3));

        store.set("a", json!(1), None).await.unwrap();
        store.set("b", json!(2), None).await.unwrap();
        assert_eq!(backing.len(), 0);
        assert_eq!(store.pending_writes(), 2);

        // Third write reaches the batch size and triggers a flush.
        store.set("c", json!(3), None).await.unwrap();
        assert_eq!(backing.len(), 3);
        assert_eq!(store.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_read_prefers_cache_then_backing() {
        let backing = Arc::new(MemoryBackingStore::new());
        backing.set("t:cold", json!("from-backing")).await.unwrap();

        let store = CachedStore::new(backing.clone(), config(100));
        store.set("warm", json!("from-cache"), None).await.unwrap();

        assert_eq!(store.get("warm").await.unwrap(), Some(json!("from-cache")));
        assert_eq!(
            store.get("cold").await.unwrap(),
            Some(json!("from-backing"))
        );

        // Cache miss populated the cache.
        assert!(store.cache.read().unwrap().contains_key("cold"));
    }

    #[tokio::test]
    async fn test_shutdown_drains_pending_writes() {
        let backing = Arc::new(MemoryBackingStore::new());
        let store = CachedStore::new(backing.clone(), config(100));

        store.set("a", json!(1), None).await.unwrap();
        store.set("b", json!(2), None).await.unwrap();
        assert_eq!(backing.len(), 0);

        store.shutdown().await.unwrap();
        assert_eq!(backing.len(), 2);

        // Second shutdown is a no-op.
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_survive_prefix_like_names() {
        let backing = Arc::new(MemoryBackingStore::new());
        let store = CachedStore::new(backing.clone(), config(1));

        store.set("t:inner", json!(1), None).await.unwrap();
        store.set("plain", json!(2), None).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["plain", "t:inner"]);
    }

    #[tokio::test]
    async fn test_delete_clears_dirty_entry() {
        let backing = Arc::new(MemoryBackingStore::new());
        let store = CachedStore::new(backing.clone(), config(100));

        store.set("a", json!(1), None).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.pending_writes(), 0);

        store.flush().await.unwrap();
        assert_eq!(backing.len(), 0);
    }
}

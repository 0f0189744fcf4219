//! Snapshot cache tiers
//!
//! The orchestrator optionally writes each adopted snapshot through two
//! tiers: a process-local size/age-bounded LRU, and a shared store keyed by
//! the configuration hash (a flat JSON file per key in this repository).
//! Both tiers hold the same unit, `CacheEntry`.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::RawEntry;

/// The snapshot unit persisted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub raw_entries: Vec<RawEntry>,
    /// Epoch milliseconds of the successful refresh that built this entry
    pub built_at_ms: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        let age_ms = now_ms.saturating_sub(self.built_at_ms);
        (age_ms as i128) < ttl.as_millis() as i128
    }
}

/// Process-local snapshot tier: size-bounded by the LRU capacity, age-bounded
/// by `max_age` (expired entries are evicted on read).
pub struct LocalSnapshotCache {
    entries: Mutex<LruCache<String, Arc<CacheEntry>>>,
    max_age: Duration,
}

impl LocalSnapshotCache {
    pub fn new(capacity: usize, max_age: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_age,
        }
    }

    pub fn get(&self, key: &str, now_ms: i64) -> Option<Arc<CacheEntry>> {
        let mut entries = self.entries.lock().expect("snapshot cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now_ms, self.max_age) => Some(Arc::clone(entry)),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, entry: Arc<CacheEntry>) {
        self.entries
            .lock()
            .expect("snapshot cache lock poisoned")
            .put(key.to_string(), entry);
    }
}

/// Shared snapshot tier, keyed by the configuration hash.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>>;
    async fn store(&self, key: &str, entry: &CacheEntry) -> Result<()>;
}

/// One JSON file per cache key under a data directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // keys are hex digests, safe as file names
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let entry = serde_json::from_str(&raw)
            .map_err(|e| Error::MalformedPayload(format!("snapshot {key}: {e}")))?;
        Ok(Some(entry))
    }

    async fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let raw = serde_json::to_vec(entry)
            .map_err(|e| Error::MalformedPayload(format!("snapshot {key}: {e}")))?;
        tokio::fs::write(self.path_for(key), raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_at(built_at_ms: i64) -> Arc<CacheEntry> {
        Arc::new(CacheEntry {
            raw_entries: vec![RawEntry {
                source_id: "1".to_string(),
                raw_name: "Pro TV".to_string(),
                stream_url: "http://example.com/1.m3u8".to_string(),
                logo_url: None,
                category_id: None,
                category_label: "Live TV".to_string(),
            }],
            built_at_ms,
        })
    }

    #[test]
    fn test_local_cache_returns_fresh_entries() {
        let cache = LocalSnapshotCache::new(4, Duration::from_secs(60));
        cache.put("key", entry_at(1_000));
        assert!(cache.get("key", 30_000).is_some());
    }

    #[test]
    fn test_local_cache_evicts_expired_entries() {
        let cache = LocalSnapshotCache::new(4, Duration::from_secs(60));
        cache.put("key", entry_at(1_000));
        assert!(cache.get("key", 120_000).is_none());
        // expired entry was dropped, not just hidden
        assert!(cache.get("key", 30_000).is_none());
    }

    #[test]
    fn test_local_cache_is_size_bounded() {
        let cache = LocalSnapshotCache::new(2, Duration::from_secs(60));
        cache.put("a", entry_at(1_000));
        cache.put("b", entry_at(1_000));
        cache.put("c", entry_at(1_000));
        assert!(cache.get("a", 2_000).is_none());
        assert!(cache.get("b", 2_000).is_some());
        assert!(cache.get("c", 2_000).is_some());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSnapshotStore::new(dir.path().to_path_buf());

        assert!(store.load("deadbeef").await.expect("load").is_none());

        let entry = entry_at(42_000);
        store.store("deadbeef", &entry).await.expect("store");

        let loaded = store
            .load("deadbeef")
            .await
            .expect("load")
            .expect("entry present");
        assert_eq!(loaded.built_at_ms, 42_000);
        assert_eq!(loaded.raw_entries.len(), 1);
        assert_eq!(loaded.raw_entries[0].raw_name, "Pro TV");
    }

    #[tokio::test]
    async fn test_file_store_corrupt_entry_is_malformed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSnapshotStore::new(dir.path().to_path_buf());
        tokio::fs::write(dir.path().join("bad.json"), "not json")
            .await
            .expect("write");

        assert!(matches!(
            store.load("bad").await,
            Err(Error::MalformedPayload(_))
        ));
    }
}

//! Refresh/cache orchestration
//!
//! Owns the raw entry list's lifecycle for one configuration key: TTL
//! staleness checks, single-flight refresh coalescing, atomic snapshot
//! replacement, optional two-tier cache write-through, and graceful
//! degradation to the last good snapshot when the upstream fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::cache::{CacheEntry, LocalSnapshotCache, SnapshotStore};
use crate::catalog::{build_catalog, Catalog};
use crate::config::ProviderConfig;
use crate::fingerprint::FingerprintCache;
use crate::provider::ProviderClient;
use crate::types::{RawEntry, DEFAULT_CATEGORY};

/// Per-configuration-key catalog state machine.
///
/// All mutation is serialized behind the refresh gate; readers share an
/// `RwLock` and only ever observe complete snapshots. The state advances
/// `Empty → Refreshing → Fresh → Stale → Refreshing → …` as callers trigger
/// lazy refreshes.
pub struct CatalogOrchestrator {
    provider: Arc<dyn ProviderClient>,
    ttl: Duration,
    cache_key: String,
    state: RwLock<SharedState>,
    /// Serializes refreshes; waiters observe the in-flight outcome via the
    /// generation counter instead of fetching again
    refresh_gate: Mutex<()>,
    local_cache: Option<Arc<LocalSnapshotCache>>,
    store: Option<Arc<dyn SnapshotStore>>,
}

struct SharedState {
    raw: Arc<Vec<RawEntry>>,
    catalog: Arc<Catalog>,
    memo: FingerprintCache,
    last_success_ms: Option<i64>,
    /// Bumped once per settled refresh attempt, success or failure
    generation: u64,
}

impl CatalogOrchestrator {
    pub fn new(config: &ProviderConfig, provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            provider,
            ttl: config.refresh_ttl,
            cache_key: config.cache_key(),
            state: RwLock::new(SharedState {
                raw: Arc::new(Vec::new()),
                catalog: Arc::new(Catalog::empty()),
                memo: FingerprintCache::new(),
                last_success_ms: None,
                generation: 0,
            }),
            refresh_gate: Mutex::new(()),
            local_cache: None,
            store: None,
        }
    }

    /// Wire the optional snapshot cache tiers.
    pub fn with_cache_tiers(
        mut self,
        local_cache: Option<Arc<LocalSnapshotCache>>,
        store: Option<Arc<dyn SnapshotStore>>,
    ) -> Self {
        self.local_cache = local_cache;
        self.store = store;
        self
    }

    /// Current raw entries; never blocks on network I/O. Empty on cold
    /// start before the first successful refresh.
    pub async fn snapshot(&self) -> Arc<Vec<RawEntry>> {
        Arc::clone(&self.state.read().await.raw)
    }

    /// Current canonical catalog; never blocks on network I/O.
    pub async fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.state.read().await.catalog)
    }

    pub async fn last_success_ms(&self) -> Option<i64> {
        self.state.read().await.last_success_ms
    }

    /// Refresh the snapshot when forced, never-fetched, or older than the
    /// TTL. Concurrent callers coalesce onto one upstream fetch and all
    /// proceed once it settles, whatever its outcome.
    pub async fn ensure_fresh(&self, force: bool) {
        let entry_generation = {
            let state = self.state.read().await;
            if !force && self.is_fresh(&state, now_ms()) {
                return;
            }
            state.generation
        };

        let _gate = self.refresh_gate.lock().await;
        {
            let state = self.state.read().await;
            // a refresh settled while we waited on the gate; its outcome is
            // the one we were coalesced onto
            if state.generation != entry_generation {
                return;
            }
            if !force && self.is_fresh(&state, now_ms()) {
                return;
            }
        }

        self.refresh(force).await;
    }

    fn is_fresh(&self, state: &SharedState, now_ms: i64) -> bool {
        state
            .last_success_ms
            .map(|t| (now_ms.saturating_sub(t) as i128) < self.ttl.as_millis() as i128)
            .unwrap_or(false)
    }

    /// Runs with the refresh gate held.
    async fn refresh(&self, force: bool) {
        if !force {
            if let Some(entry) = self.read_through().await {
                tracing::info!(
                    entries = entry.raw_entries.len(),
                    "adopting snapshot from cache tier"
                );
                self.adopt(entry).await;
                return;
            }
        }

        match self.fetch_upstream().await {
            Ok(raw_entries) => {
                let entry = CacheEntry {
                    raw_entries,
                    built_at_ms: now_ms(),
                };
                self.write_through(&entry).await;
                self.adopt(entry).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "refresh failed; keeping previous snapshot");
                let mut state = self.state.write().await;
                state.generation += 1;
            }
        }
    }

    /// Consult the local tier, then the shared store, for a snapshot fresher
    /// than both the TTL and our own last success.
    async fn read_through(&self) -> Option<CacheEntry> {
        let last_success = self.state.read().await.last_success_ms;
        let now = now_ms();
        let newer = |built_at: i64| last_success.map(|t| built_at > t).unwrap_or(true);

        if let Some(cache) = &self.local_cache {
            if let Some(entry) = cache.get(&self.cache_key, now) {
                if entry.is_fresh(now, self.ttl) && newer(entry.built_at_ms) {
                    return Some(entry.as_ref().clone());
                }
            }
        }

        if let Some(store) = &self.store {
            match store.load(&self.cache_key).await {
                Ok(Some(entry)) if entry.is_fresh(now, self.ttl) && newer(entry.built_at_ms) => {
                    if let Some(cache) = &self.local_cache {
                        cache.put(&self.cache_key, Arc::new(entry.clone()));
                    }
                    return Some(entry);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "snapshot store read failed");
                }
            }
        }
        None
    }

    async fn write_through(&self, entry: &CacheEntry) {
        if let Some(cache) = &self.local_cache {
            cache.put(&self.cache_key, Arc::new(entry.clone()));
        }
        if let Some(store) = &self.store {
            if let Err(err) = store.store(&self.cache_key, entry).await {
                tracing::warn!(error = %err, "snapshot store write failed");
            }
        }
    }

    /// Fetch streams and categories concurrently; the category map is best
    /// effort and only degrades labels when it fails.
    async fn fetch_upstream(&self) -> crate::error::Result<Vec<RawEntry>> {
        let (streams, categories) = tokio::join!(
            self.provider.fetch_live_streams(),
            self.provider.fetch_categories(),
        );

        let mut entries = streams?;
        match categories {
            Ok(map) => relabel(&mut entries, &map),
            Err(err) => {
                tracing::warn!(error = %err, "category fetch failed; using default labels");
            }
        }
        Ok(entries)
    }

    /// Atomically adopt a new snapshot: rebuild the catalog with a cleared
    /// fingerprint memo and swap both `Arc`s under the write lock.
    async fn adopt(&self, entry: CacheEntry) {
        let mut state = self.state.write().await;
        state.memo.clear();
        let catalog = build_catalog(&entry.raw_entries, &mut state.memo);
        state.catalog = Arc::new(catalog);
        state.raw = Arc::new(entry.raw_entries);
        state.last_success_ms = Some(entry.built_at_ms);
        state.generation += 1;
        tracing::info!(
            channels = state.catalog.len(),
            sources = state.raw.len(),
            "adopted refreshed channel catalog"
        );
    }
}

fn relabel(entries: &mut [RawEntry], categories: &HashMap<String, String>) {
    for entry in entries {
        entry.category_label = entry
            .category_id
            .as_ref()
            .and_then(|id| categories.get(id))
            .cloned()
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

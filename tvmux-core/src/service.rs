//! Channel service facade
//!
//! Ties the orchestrator, the access history and the guide resolver
//! together behind the three operations the rest of the application
//! consumes: catalog listing, channel detail, and stream selection.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::{FileSnapshotStore, LocalSnapshotCache, SnapshotStore};
use crate::catalog::CanonicalChannel;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::guide::GuideResolver;
use crate::history::AccessHistory;
use crate::orchestrator::CatalogOrchestrator;
use crate::provider::build_clients;
use crate::types::{ChannelDetail, ChannelSummary, StreamOption};

/// Catalog listing filter; all fields combine conjunctively.
#[derive(Debug, Default, Clone)]
pub struct CatalogFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    /// Restrict to recently-accessed channels, in access order
    pub history_only: bool,
}

/// One service instance per provider configuration.
pub struct ChannelService {
    orchestrator: Arc<CatalogOrchestrator>,
    history: Arc<AccessHistory>,
    guide: GuideResolver,
    catalog_limit: usize,
}

impl ChannelService {
    /// Build the full service for a validated configuration: provider and
    /// guide clients, cache tiers under the data directory, persisted
    /// access history, and the orchestrator owning the snapshot.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let (provider, guide_client) = build_clients(config)?;

        let local_cache = Arc::new(LocalSnapshotCache::new(8, config.refresh_ttl));
        let store: Option<Arc<dyn SnapshotStore>> = config
            .data_dir
            .as_ref()
            .map(|dir| {
                Arc::new(FileSnapshotStore::new(dir.join("snapshots"))) as Arc<dyn SnapshotStore>
            });
        let history = match &config.data_dir {
            Some(dir) => AccessHistory::with_persistence(
                AccessHistory::DEFAULT_CAPACITY,
                dir.join("history.json"),
            ),
            None => AccessHistory::new(AccessHistory::DEFAULT_CAPACITY),
        };

        let orchestrator = CatalogOrchestrator::new(config, provider)
            .with_cache_tiers(Some(local_cache), store);

        Ok(Self::with_parts(
            Arc::new(orchestrator),
            Arc::new(history),
            GuideResolver::new(guide_client, config.display_offset_minutes),
            config.catalog_limit,
        ))
    }

    /// Assemble a service from pre-built parts (used by tests and by
    /// callers wiring custom clients).
    pub fn with_parts(
        orchestrator: Arc<CatalogOrchestrator>,
        history: Arc<AccessHistory>,
        guide: GuideResolver,
        catalog_limit: usize,
    ) -> Self {
        Self {
            orchestrator,
            history,
            guide,
            catalog_limit,
        }
    }

    /// List catalog summaries matching `filter`, freshest snapshot first
    /// ensured lazily.
    pub async fn list_catalog(&self, filter: &CatalogFilter) -> Vec<ChannelSummary> {
        self.orchestrator.ensure_fresh(false).await;
        let catalog = self.orchestrator.catalog().await;

        let matches = |channel: &CanonicalChannel| {
            let search_ok = filter
                .search
                .as_ref()
                .map(|q| {
                    channel
                        .display_name
                        .to_lowercase()
                        .contains(&q.to_lowercase())
                })
                .unwrap_or(true);
            let category_ok = filter
                .category
                .as_ref()
                .map(|c| channel.category_label.eq_ignore_ascii_case(c))
                .unwrap_or(true);
            search_ok && category_ok
        };

        let summaries: Vec<ChannelSummary> = if filter.history_only {
            self.history
                .list()
                .iter()
                .filter_map(|fingerprint| catalog.get(fingerprint))
                .filter(|c| matches(c))
                .map(summarize)
                .collect()
        } else {
            catalog
                .channels()
                .iter()
                .filter(|c| matches(c))
                .map(summarize)
                .collect()
        };

        summaries.into_iter().take(self.catalog_limit).collect()
    }

    /// Detail view with rendered guide text; `None` for unknown channels.
    pub async fn channel_detail(&self, fingerprint: &str) -> Option<ChannelDetail> {
        self.orchestrator.ensure_fresh(false).await;
        let catalog = self.orchestrator.catalog().await;
        let channel = catalog.get(fingerprint)?;
        let primary = channel.primary()?;

        let now = Utc::now();
        let view = self.guide.resolve(&primary.entry.source_id, now).await;
        let description =
            self.guide
                .render_description(&channel.display_name, &channel.category_label, &view, now);

        Some(ChannelDetail {
            display_name: channel.display_name.clone(),
            poster: channel.logo_url.clone(),
            description,
            source_count: channel.sources.len(),
        })
    }

    /// Playable options ordered by descending quality tier. Selection
    /// records an access-history touch. An unknown fingerprint yields an
    /// empty list: the channel disappearing between listing and selection
    /// is an expected race, not an error.
    pub async fn select_stream(&self, fingerprint: &str) -> Vec<StreamOption> {
        self.orchestrator.ensure_fresh(false).await;
        let catalog = self.orchestrator.catalog().await;
        let Some(channel) = catalog.get(fingerprint) else {
            tracing::debug!(fingerprint, "stream selection for unknown channel");
            return Vec::new();
        };

        self.history.touch(fingerprint);

        channel
            .sources
            .iter()
            .map(|source| StreamOption {
                url: source.entry.stream_url.clone(),
                label: format!(
                    "{} {} • {}",
                    source.tier.icon(),
                    source.tier.label(),
                    channel.display_name
                ),
            })
            .collect()
    }

    pub fn history(&self) -> &AccessHistory {
        &self.history
    }

    pub fn orchestrator(&self) -> &CatalogOrchestrator {
        &self.orchestrator
    }
}

fn summarize(channel: &CanonicalChannel) -> ChannelSummary {
    ChannelSummary {
        id: channel.fingerprint.clone(),
        name: channel.display_name.clone(),
        poster: channel.logo_url.clone(),
    }
}

//! Shared data types for the channel catalog core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category label used when the provider's category map is missing or does
/// not cover an entry.
pub const DEFAULT_CATEGORY: &str = "Live TV";

/// One upstream-reported stream, as produced by a refresh cycle.
///
/// Entries are immutable once fetched; a refresh replaces the whole list.
/// `category_id` is kept alongside the resolved `category_label` so the
/// orchestrator can re-label entries from the best-effort category map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntry {
    /// Provider-unique stream identifier
    pub source_id: String,
    /// Noisy display name as reported by the provider
    pub raw_name: String,
    /// Playable stream URL
    pub stream_url: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_label: String,
}

/// One program guide item for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramEntry {
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Catalog listing row: id is the canonical channel's fingerprint.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSummary {
    pub id: String,
    pub name: String,
    pub poster: String,
}

/// Detail view for one canonical channel, guide text included.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelDetail {
    pub display_name: String,
    pub poster: String,
    pub description: String,
    pub source_count: usize,
}

/// One playable option for a channel, ranked by quality tier.
#[derive(Debug, Clone, Serialize)]
pub struct StreamOption {
    pub url: String,
    pub label: String,
}

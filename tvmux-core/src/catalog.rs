//! Canonical channel catalog
//!
//! Folds the provider's raw stream list into deduplicated canonical
//! channels. Entries sharing a fingerprint become one channel carrying all
//! of its raw sources ranked by quality tier.

use std::collections::HashMap;

use serde::Serialize;

use crate::fingerprint::FingerprintCache;
use crate::quality::{self, QualityTier};
use crate::types::RawEntry;

/// One raw source inside a canonical channel, paired with its tier.
#[derive(Debug, Clone, Serialize)]
pub struct RankedSource {
    pub entry: RawEntry,
    pub tier: QualityTier,
}

/// The deduplicated, user-facing channel entity.
///
/// Rebuilt in full on every refresh cycle; never mutated incrementally.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalChannel {
    pub fingerprint: String,
    /// Cleaned from the first-seen entry's raw name
    pub display_name: String,
    pub logo_url: String,
    pub category_label: String,
    /// Sorted by tier descending; ties keep relative input order
    pub sources: Vec<RankedSource>,
}

impl CanonicalChannel {
    /// Highest-ranked source; grouping guarantees at least one.
    pub fn primary(&self) -> Option<&RankedSource> {
        self.sources.first()
    }
}

/// Immutable catalog snapshot: channels in first-seen order plus a
/// fingerprint index. Listing order never depends on hash-map iteration.
#[derive(Debug, Default)]
pub struct Catalog {
    channels: Vec<CanonicalChannel>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn channels(&self) -> &[CanonicalChannel] {
        &self.channels
    }

    pub fn get(&self, fingerprint: &str) -> Option<&CanonicalChannel> {
        self.index.get(fingerprint).map(|&i| &self.channels[i])
    }

    /// Case-insensitive substring search over display names.
    pub fn search(&self, query: &str) -> Vec<&CanonicalChannel> {
        let needle = query.to_lowercase();
        self.channels
            .iter()
            .filter(|c| c.display_name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn by_category(&self, label: &str) -> Vec<&CanonicalChannel> {
        self.channels
            .iter()
            .filter(|c| c.category_label.eq_ignore_ascii_case(label))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Group raw entries into canonical channels.
///
/// For N entries producing K distinct fingerprints the catalog holds exactly
/// K channels whose source lists together hold exactly N entries. The memo
/// table belongs to the current refresh epoch and is supplied by the caller.
pub fn build_catalog(entries: &[RawEntry], memo: &mut FingerprintCache) -> Catalog {
    let mut channels: Vec<CanonicalChannel> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let fingerprint = memo.get(&entry.raw_name);
        let tier = quality::classify(&entry.raw_name);

        let slot = *index.entry(fingerprint.clone()).or_insert_with(|| {
            channels.push(seed_channel(fingerprint.clone(), entry));
            channels.len() - 1
        });
        channels[slot].sources.push(RankedSource {
            entry: entry.clone(),
            tier,
        });
    }

    for channel in &mut channels {
        // logo preference follows insertion order, representative first
        channel.logo_url = resolve_logo(&channel.display_name, &channel.sources);
        channel
            .sources
            .sort_by(|a, b| b.tier.cmp(&a.tier));
    }

    Catalog { channels, index }
}

fn seed_channel(fingerprint: String, entry: &RawEntry) -> CanonicalChannel {
    CanonicalChannel {
        fingerprint,
        display_name: quality::clean_display_name(&entry.raw_name),
        logo_url: String::new(),
        category_label: entry.category_label.clone(),
        sources: Vec::new(),
    }
}

fn resolve_logo(display_name: &str, sources: &[RankedSource]) -> String {
    sources
        .iter()
        .filter_map(|s| s.entry.logo_url.as_deref())
        .find(|url| url.starts_with("http://") || url.starts_with("https://"))
        .map(str::to_string)
        .unwrap_or_else(|| placeholder_logo(display_name))
}

/// Deterministic placeholder poster derived from the display name.
fn placeholder_logo(display_name: &str) -> String {
    let text = display_name
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("+");
    let text = if text.is_empty() { "TV".to_string() } else { text };
    format!("https://via.placeholder.com/300x300?text={text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_id: &str, raw_name: &str, logo: Option<&str>) -> RawEntry {
        RawEntry {
            source_id: source_id.to_string(),
            raw_name: raw_name.to_string(),
            stream_url: format!("http://example.com/live/{source_id}.m3u8"),
            logo_url: logo.map(str::to_string),
            category_id: None,
            category_label: "Romania".to_string(),
        }
    }

    fn build(entries: &[RawEntry]) -> Catalog {
        let mut memo = FingerprintCache::new();
        build_catalog(entries, &mut memo)
    }

    #[test]
    fn test_grouping_cardinality() {
        let entries = vec![
            entry("1", "Pro TV", None),
            entry("2", "Pro TV HD", None),
            entry("3", "Digi Sport 1", None),
            entry("4", "[RO] Pro TV 4K", None),
        ];
        let catalog = build(&entries);
        assert_eq!(catalog.len(), 2);
        let total: usize = catalog.channels().iter().map(|c| c.sources.len()).sum();
        assert_eq!(total, entries.len());
    }

    #[test]
    fn test_source_ranking_non_increasing() {
        let entries = vec![
            entry("1", "Pro TV", None),
            entry("2", "Pro TV 4K", None),
            entry("3", "Pro TV HD", None),
            entry("4", "Pro TV FHD", None),
        ];
        let catalog = build(&entries);
        let channel = catalog.get("protv").expect("channel grouped");
        let ranks: Vec<u8> = channel.sources.iter().map(|s| s.tier.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ranks, sorted);
        assert_eq!(channel.primary().unwrap().entry.source_id, "2");
    }

    #[test]
    fn test_ties_keep_input_order() {
        let entries = vec![
            entry("a", "Pro TV HD", None),
            entry("b", "[RO] Pro TV HD", None),
            entry("c", "Pro TV 720p", None),
        ];
        let catalog = build(&entries);
        let channel = catalog.get("protv").unwrap();
        let ids: Vec<&str> = channel
            .sources
            .iter()
            .map(|s| s.entry.source_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_first_seen_entry_wins_display_name() {
        let entries = vec![
            entry("1", "[RO] Pro TV HD", None),
            entry("2", "Pro TV FHD", None),
        ];
        let catalog = build(&entries);
        let channel = catalog.get("protv").unwrap();
        assert_eq!(channel.display_name, "Pro TV");
        assert_eq!(channel.sources.len(), 2);
    }

    #[test]
    fn test_listing_order_is_first_seen() {
        let entries = vec![
            entry("1", "Digi Sport 1", None),
            entry("2", "Pro TV", None),
            entry("3", "Digi Sport 1 HD", None),
        ];
        let catalog = build(&entries);
        let names: Vec<&str> = catalog
            .channels()
            .iter()
            .map(|c| c.display_name.as_str())
            .collect();
        assert_eq!(names, ["Digi Sport 1", "Pro TV"]);
    }

    #[test]
    fn test_logo_prefers_first_absolute_url() {
        let entries = vec![
            entry("1", "Pro TV", Some("not-a-url.png")),
            entry("2", "Pro TV HD", Some("https://cdn.example.com/protv.png")),
        ];
        let catalog = build(&entries);
        let channel = catalog.get("protv").unwrap();
        assert_eq!(channel.logo_url, "https://cdn.example.com/protv.png");
    }

    #[test]
    fn test_logo_placeholder_is_deterministic() {
        let entries = vec![entry("1", "Pro TV", None)];
        let a = build(&entries);
        let b = build(&entries);
        let logo = a.get("protv").unwrap().logo_url.clone();
        assert_eq!(logo, b.get("protv").unwrap().logo_url);
        assert_eq!(logo, "https://via.placeholder.com/300x300?text=Pro+TV");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let entries = vec![
            entry("1", "Pro TV", None),
            entry("2", "Digi Sport 1", None),
        ];
        let catalog = build(&entries);
        assert_eq!(catalog.search("pro").len(), 1);
        assert_eq!(catalog.search("SPORT").len(), 1);
        assert!(catalog.search("nope").is_empty());
    }

    #[test]
    fn test_by_category() {
        let mut first = entry("1", "Pro TV", None);
        first.category_label = "News".to_string();
        let entries = vec![first, entry("2", "Digi Sport 1", None)];
        let catalog = build(&entries);
        assert_eq!(catalog.by_category("news").len(), 1);
        assert_eq!(catalog.by_category("Romania").len(), 1);
    }

    #[test]
    fn test_colliding_fingerprints_always_group() {
        // cosmetically different cleaned names still co-group on key equality
        let entries = vec![
            entry("1", "Pro TV", None),
            entry("2", "PRO tv hd", None),
        ];
        let catalog = build(&entries);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("protv").unwrap().display_name, "Pro TV");
    }
}

//! Upstream provider clients
//!
//! `ProviderClient` and `GuideClient` are the seams between the catalog
//! core and the provider protocol; `XtreamClient` implements both against
//! the Xtream `player_api.php` API. Clients carry a fixed timeout and map
//! transport failures onto the shared error taxonomy; they never retry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{Error, Result};
use crate::types::{ProgramEntry, RawEntry, DEFAULT_CATEGORY};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetches the raw stream list and the category map.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn fetch_live_streams(&self) -> Result<Vec<RawEntry>>;

    /// Best effort: callers degrade category labels on failure instead of
    /// failing the refresh.
    async fn fetch_categories(&self) -> Result<HashMap<String, String>>;
}

/// Fetches the short program guide for one source.
#[async_trait]
pub trait GuideClient: Send + Sync {
    /// May legitimately return fewer entries than a full window, or none.
    async fn fetch_short_epg(&self, source_id: &str) -> Result<Vec<ProgramEntry>>;
}

/// Build the provider and guide clients for a configuration.
///
/// Provider selection is a closed enum resolved here, at construction time.
pub fn build_clients(
    config: &ProviderConfig,
) -> Result<(Arc<dyn ProviderClient>, Arc<dyn GuideClient>)> {
    match config.kind {
        ProviderKind::Xtream => {
            let client = Arc::new(XtreamClient::new(config)?);
            let provider: Arc<dyn ProviderClient> = client.clone();
            let guide: Arc<dyn GuideClient> = client;
            Ok((provider, guide))
        }
    }
}

/// Xtream Codes API client
pub struct XtreamClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    fetch_limit: usize,
}

impl XtreamClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            fetch_limit: config.fetch_limit,
        })
    }

    async fn player_api(&self, action: &str, extra: Option<(&str, &str)>) -> Result<String> {
        let url = format!("{}/player_api.php", self.base_url);
        let mut request = self.http.get(&url).query(&[
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("action", action),
        ]);
        if let Some((name, value)) = extra {
            request = request.query(&[(name, value)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "provider returned HTTP {status} for {action}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        // some panels serve an HTML error page with a 200 status
        if body.trim_start().starts_with('<') {
            return Err(Error::MalformedPayload(format!(
                "provider returned HTML for {action}"
            )));
        }
        Ok(body)
    }

    fn stream_url(&self, stream_id: &str) -> String {
        format!(
            "{}/live/{}/{}/{}.m3u8",
            self.base_url, self.username, self.password, stream_id
        )
    }
}

#[async_trait]
impl ProviderClient for XtreamClient {
    async fn fetch_live_streams(&self) -> Result<Vec<RawEntry>> {
        let body = self.player_api("get_live_streams", None).await?;
        let streams: Vec<LiveStreamPayload> =
            serde_json::from_str(&body).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        let total = streams.len();
        if total > self.fetch_limit {
            tracing::debug!(total, limit = self.fetch_limit, "capping live stream list");
        }

        let entries = streams
            .into_iter()
            .take(self.fetch_limit)
            .map(|stream| RawEntry {
                stream_url: self.stream_url(&stream.stream_id),
                source_id: stream.stream_id,
                raw_name: stream.name,
                logo_url: stream.stream_icon.filter(|icon| !icon.is_empty()),
                category_id: stream.category_id,
                category_label: DEFAULT_CATEGORY.to_string(),
            })
            .collect();
        Ok(entries)
    }

    async fn fetch_categories(&self) -> Result<HashMap<String, String>> {
        let body = self.player_api("get_live_categories", None).await?;
        let categories: Vec<CategoryPayload> =
            serde_json::from_str(&body).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        Ok(categories
            .into_iter()
            .map(|c| (c.category_id, c.category_name))
            .collect())
    }
}

#[async_trait]
impl GuideClient for XtreamClient {
    async fn fetch_short_epg(&self, source_id: &str) -> Result<Vec<ProgramEntry>> {
        let body = self
            .player_api("get_short_epg", Some(("stream_id", source_id)))
            .await?;
        let payload: ShortEpgPayload =
            serde_json::from_str(&body).map_err(|e| Error::MalformedPayload(e.to_string()))?;

        let entries = payload
            .epg_listings
            .into_iter()
            .filter_map(ProgramEntry::from_listing)
            .collect();
        Ok(entries)
    }
}

impl ProgramEntry {
    /// Entries without a parseable time window are dropped; garbled text
    /// fields degrade to the raw string instead.
    fn from_listing(listing: EpgListingPayload) -> Option<Self> {
        let start = parse_epg_time(
            listing.start_timestamp.as_deref(),
            listing.start.as_deref(),
        )?;
        let end = parse_epg_time(listing.stop_timestamp.as_deref(), listing.end.as_deref())?;
        Some(Self {
            title: listing
                .title
                .as_deref()
                .map(decode_text_field)
                .unwrap_or_else(|| "Program".to_string()),
            description: listing
                .description
                .as_deref()
                .map(decode_text_field)
                .unwrap_or_default(),
            start,
            end,
        })
    }
}

/// Guide text arrives base64-encoded; decoding failures degrade to the raw
/// string rather than erroring or discarding the entry.
pub fn decode_text_field(raw: &str) -> String {
    base64::engine::general_purpose::STANDARD
        .decode(raw)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_string())
}

/// Prefer the epoch-seconds field, fall back to `YYYY-MM-DD HH:MM:SS`.
fn parse_epg_time(timestamp: Option<&str>, formatted: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(secs) = timestamp.and_then(|t| t.parse::<i64>().ok()) {
        if let Some(parsed) = Utc.timestamp_opt(secs, 0).single() {
            return Some(parsed);
        }
    }
    formatted
        .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Deserialize)]
struct LiveStreamPayload {
    #[serde(deserialize_with = "number_or_string")]
    stream_id: String,
    name: String,
    #[serde(default)]
    stream_icon: Option<String>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryPayload {
    #[serde(deserialize_with = "number_or_string")]
    category_id: String,
    category_name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ShortEpgPayload {
    #[serde(default)]
    epg_listings: Vec<EpgListingPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct EpgListingPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    start_timestamp: Option<String>,
    #[serde(default, deserialize_with = "optional_number_or_string")]
    stop_timestamp: Option<String>,
}

/// Xtream panels report ids interchangeably as numbers or strings.
fn number_or_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn optional_number_or_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected string, number, or null, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_stream_payload_tolerates_numeric_ids() {
        let body = r#"[
            {"stream_id": 42, "name": "Pro TV HD", "stream_icon": "https://cdn/p.png", "category_id": 7},
            {"stream_id": "43", "name": "Digi Sport 1", "category_id": "8"}
        ]"#;
        let streams: Vec<LiveStreamPayload> = serde_json::from_str(body).expect("parse");
        assert_eq!(streams[0].stream_id, "42");
        assert_eq!(streams[0].category_id.as_deref(), Some("7"));
        assert_eq!(streams[1].stream_id, "43");
        assert_eq!(streams[1].category_id.as_deref(), Some("8"));
    }

    #[test]
    fn test_decode_text_field_round_trip() {
        // "Stirile Pro TV" base64-encoded
        assert_eq!(decode_text_field("U3RpcmlsZSBQcm8gVFY="), "Stirile Pro TV");
    }

    #[test]
    fn test_decode_text_field_degrades_to_raw() {
        assert_eq!(decode_text_field("Stirile Pro TV"), "Stirile Pro TV");
        assert_eq!(decode_text_field(""), "");
    }

    #[test]
    fn test_parse_epg_time_prefers_epoch() {
        let parsed = parse_epg_time(Some("1700000000"), Some("2000-01-01 00:00:00"))
            .expect("parsed");
        assert_eq!(parsed.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_epg_time_falls_back_to_formatted() {
        let parsed = parse_epg_time(None, Some("2024-03-01 20:30:00")).expect("parsed");
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2024, 3, 1, 20, 30, 0).unwrap()
        );
        assert!(parse_epg_time(None, Some("whenever")).is_none());
        assert!(parse_epg_time(None, None).is_none());
    }

    #[test]
    fn test_short_epg_payload_skips_unparseable_windows() {
        let body = r#"{"epg_listings": [
            {"title": "UHJvZ3JhbQ==", "start_timestamp": "1700000000", "stop_timestamp": "1700003600"},
            {"title": "broken", "start": "not a time"}
        ]}"#;
        let payload: ShortEpgPayload = serde_json::from_str(body).expect("parse");
        let entries: Vec<ProgramEntry> = payload
            .epg_listings
            .into_iter()
            .filter_map(ProgramEntry::from_listing)
            .collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Program");
    }

    #[test]
    fn test_empty_epg_listings_parse_as_empty() {
        let payload: ShortEpgPayload = serde_json::from_str("{}").expect("parse");
        assert!(payload.epg_listings.is_empty());
    }
}

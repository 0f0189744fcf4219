//! Addon HTTP endpoints
//!
//! Stremio-style surface: manifest, catalog (with search extra), meta and
//! stream routes plus a health check. Channel ids on the wire are
//! `iptv_<fingerprint>`. Unknown channels answer with empty results, never
//! 5xx: a channel disappearing between listing and selection is an
//! expected race.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tvmux_core::{CatalogFilter, ChannelService};

const ID_PREFIX: &str = "iptv_";
const CATALOG_ALL: &str = "iptv_channels";
const CATALOG_RECENT: &str = "iptv_recent";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChannelService>,
    pub port: u16,
}

/// Create the addon router
pub fn create_router(state: AppState) -> Router {
    // Stremio clients load the addon cross-origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/manifest.json", get(manifest))
        .route("/catalog/tv/:catalog_id", get(catalog))
        .route("/catalog/tv/:catalog_id/:extra", get(catalog_with_extra))
        .route("/meta/tv/:channel_id", get(meta))
        .route("/stream/tv/:channel_id", get(stream))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "module": "tvmux-addon",
        "version": env!("CARGO_PKG_VERSION"),
        "port": state.port,
    }))
}

async fn manifest() -> Json<Value> {
    Json(json!({
        "id": "org.tvmux.livetv",
        "version": env!("CARGO_PKG_VERSION"),
        "name": "TVMux Live TV",
        "description": "Live TV catalog with quality-ranked sources and program guide",
        "resources": ["catalog", "meta", "stream"],
        "types": ["tv"],
        "catalogs": [
            {
                "type": "tv",
                "id": CATALOG_ALL,
                "name": "Live TV",
                "extra": [{ "name": "search" }]
            },
            {
                "type": "tv",
                "id": CATALOG_RECENT,
                "name": "Recently Watched"
            }
        ],
        "idPrefixes": [ID_PREFIX]
    }))
}

async fn catalog(
    State(state): State<AppState>,
    Path(catalog_id): Path<String>,
) -> Json<Value> {
    respond_catalog(&state, &catalog_id, None).await
}

async fn catalog_with_extra(
    State(state): State<AppState>,
    Path((catalog_id, extra)): Path<(String, String)>,
) -> Json<Value> {
    respond_catalog(&state, &catalog_id, Some(&extra)).await
}

async fn respond_catalog(state: &AppState, catalog_id: &str, extra: Option<&str>) -> Json<Value> {
    let catalog_id = trim_json_suffix(catalog_id);
    let filter = CatalogFilter {
        search: extra.and_then(extra_search),
        category: None,
        history_only: catalog_id == CATALOG_RECENT,
    };

    let metas: Vec<Value> = state
        .service
        .list_catalog(&filter)
        .await
        .into_iter()
        .map(|summary| {
            json!({
                "id": format!("{ID_PREFIX}{}", summary.id),
                "type": "tv",
                "name": summary.name,
                "poster": summary.poster,
                "posterShape": "square",
            })
        })
        .collect();

    Json(json!({ "metas": metas }))
}

async fn meta(State(state): State<AppState>, Path(channel_id): Path<String>) -> Json<Value> {
    let Some(fingerprint) = parse_channel_id(&channel_id) else {
        return Json(json!({ "meta": Value::Null }));
    };

    let meta = match state.service.channel_detail(fingerprint).await {
        Some(detail) => json!({
            "id": format!("{ID_PREFIX}{fingerprint}"),
            "type": "tv",
            "name": detail.display_name,
            "description": detail.description,
            "poster": detail.poster,
            "background": detail.poster,
            "logo": detail.poster,
        }),
        None => Value::Null,
    };
    Json(json!({ "meta": meta }))
}

async fn stream(State(state): State<AppState>, Path(channel_id): Path<String>) -> Json<Value> {
    let Some(fingerprint) = parse_channel_id(&channel_id) else {
        return Json(json!({ "streams": [] }));
    };

    let streams: Vec<Value> = state
        .service
        .select_stream(fingerprint)
        .await
        .into_iter()
        .map(|option| json!({ "url": option.url, "title": option.label }))
        .collect();
    Json(json!({ "streams": streams }))
}

fn trim_json_suffix(raw: &str) -> &str {
    raw.strip_suffix(".json").unwrap_or(raw)
}

fn parse_channel_id(raw: &str) -> Option<&str> {
    trim_json_suffix(raw).strip_prefix(ID_PREFIX)
}

/// `search=foo%20bar` → `foo bar`; non-search extras are ignored.
fn extra_search(extra: &str) -> Option<String> {
    let raw = trim_json_suffix(extra).strip_prefix("search=")?;
    let decoded = raw.replace('+', " ").replace("%20", " ");
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_id() {
        assert_eq!(parse_channel_id("iptv_protv.json"), Some("protv"));
        assert_eq!(parse_channel_id("iptv_protv"), Some("protv"));
        assert_eq!(parse_channel_id("bogus_protv.json"), None);
    }

    #[test]
    fn test_extra_search() {
        assert_eq!(extra_search("search=pro.json"), Some("pro".to_string()));
        assert_eq!(
            extra_search("search=sky%20sports"),
            Some("sky sports".to_string())
        );
        assert_eq!(extra_search("genre=news.json"), None);
        assert_eq!(extra_search("search=.json"), None);
    }

    #[test]
    fn test_trim_json_suffix() {
        assert_eq!(trim_json_suffix("iptv_channels.json"), "iptv_channels");
        assert_eq!(trim_json_suffix("iptv_channels"), "iptv_channels");
    }
}

//! Provider configuration loading and cache-key derivation

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Upstream provider protocol, selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Xtream,
}

/// Configuration for one provider deployment.
///
/// The core only uses this to drive the provider/guide clients and to
/// derive the cache key; it never interprets credentials beyond that.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// UTC offset applied to guide times in rendered description text
    pub display_offset_minutes: i32,
    /// Maximum snapshot age before a refresh is triggered
    pub refresh_ttl: Duration,
    /// Fixed timeout for every upstream network call
    pub request_timeout: Duration,
    /// Listing cap for catalog responses
    pub catalog_limit: usize,
    /// Cap on raw entries accepted from one provider fetch
    pub fetch_limit: usize,
    /// Directory for the snapshot store and history file; None disables
    /// persistence
    pub data_dir: Option<PathBuf>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Xtream,
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            display_offset_minutes: 0,
            refresh_ttl: Duration::from_secs(20 * 60),
            request_timeout: Duration::from_secs(8),
            catalog_limit: 1000,
            fetch_limit: 2500,
            data_dir: default_data_dir(),
        }
    }
}

impl ProviderConfig {
    /// Fatal at startup: the core assumes valid configuration once built.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(Error::ConfigurationIncomplete(
                "provider base URL, username and password are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Stable hash of the (provider, credentials, offset) tuple.
    ///
    /// Keys snapshot caches so distinct configurations never collide.
    pub fn cache_key(&self) -> String {
        let input = format!(
            "{}|{}|{}|{}",
            self.base_url, self.username, self.password, self.display_offset_minutes
        );
        format!("{:x}", Sha256::digest(input.as_bytes()))
    }

    /// Resolve configuration with priority order env > TOML file > default.
    ///
    /// `toml_path` overrides the platform config location when given.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file) = read_toml(toml_path)? {
            config.apply_toml(file);
        }
        config.apply_env();
        Ok(config)
    }

    fn apply_toml(&mut self, file: TomlConfig) {
        if let Some(kind) = file.provider {
            self.kind = kind;
        }
        if let Some(base_url) = file.base_url {
            self.base_url = base_url;
        }
        if let Some(username) = file.username {
            self.username = username;
        }
        if let Some(password) = file.password {
            self.password = password;
        }
        if let Some(minutes) = file.display_offset_minutes {
            self.display_offset_minutes = minutes;
        }
        if let Some(secs) = file.refresh_ttl_secs {
            self.refresh_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = Some(dir);
        }
    }

    fn apply_env(&mut self) {
        if let Some(url) = env_first(&["XTREAM_URL", "XTREAM_HOST"]) {
            self.base_url = url;
        }
        if let Some(user) = env_first(&["XTREAM_USER", "XTREAM_USERNAME"]) {
            self.username = user;
        }
        if let Some(password) = env_first(&["XTREAM_PASSWORD"]) {
            self.password = password;
        }
        if let Some(minutes) = env_parse::<i32>("TVMUX_DISPLAY_OFFSET_MINUTES") {
            self.display_offset_minutes = minutes;
        }
        if let Some(secs) = env_parse::<u64>("TVMUX_TTL_SECS") {
            self.refresh_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse::<u64>("TVMUX_TIMEOUT_SECS") {
            self.request_timeout = Duration::from_secs(secs);
        }
    }
}

/// On-disk configuration file shape; every field optional.
#[derive(Debug, Default, Deserialize)]
pub struct TomlConfig {
    pub provider: Option<ProviderKind>,
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_offset_minutes: Option<i32>,
    pub refresh_ttl_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub data_dir: Option<PathBuf>,
}

fn read_toml(explicit: Option<&Path>) -> Result<Option<TomlConfig>> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_file() {
            Some(path) if path.exists() => path,
            _ => return Ok(None),
        },
    };
    let raw = std::fs::read_to_string(&path)?;
    let parsed = toml::from_str(&raw)
        .map_err(|e| Error::ConfigurationIncomplete(format!("bad config file {path:?}: {e}")))?;
    Ok(Some(parsed))
}

/// `~/.config/tvmux/config.toml` (or the platform equivalent)
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tvmux").join("config.toml"))
}

/// `~/.local/share/tvmux` (or the platform equivalent)
fn default_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tvmux"))
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

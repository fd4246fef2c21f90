//! Store configuration.
//!
//! [`StoreConfig`] is read from a TOML file (every key optional), then
//! overridden by `SOUNDBOARD_*` environment variables. Endpoint paths are
//! joined onto the two base URLs, so base URLs are normalized to end in `/`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StoreError};

/// Environment variable overriding [`StoreConfig::auth_base_url`].
pub const ENV_AUTH_URL: &str = "SOUNDBOARD_AUTH_URL";

/// Environment variable overriding [`StoreConfig::api_base_url`].
pub const ENV_API_URL: &str = "SOUNDBOARD_API_URL";

/// Environment variable overriding [`StoreConfig::storage_path`].
pub const ENV_STORAGE: &str = "SOUNDBOARD_STORAGE";

/// Page size requested when listing categories.
pub const DEFAULT_CATEGORIES_LIMIT: u32 = 1000;

/// Connection and endpoint settings for an [`AppStore`](crate::AppStore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the authentication service.
    pub auth_base_url: String,

    /// Base URL of the general API.
    pub api_base_url: String,

    /// Token obtain endpoint, relative to `auth_base_url`.
    pub token_path: String,

    /// Token refresh endpoint, relative to `auth_base_url`.
    pub refresh_path: String,

    /// Refresh-token blacklist endpoint, relative to `auth_base_url`.
    pub blacklist_path: String,

    /// Category listing endpoint, relative to `api_base_url`.
    pub categories_path: String,

    /// `limit` query parameter sent with the category listing.
    pub categories_limit: u32,

    /// SQLite file backing the persisted tokens.
    pub storage_path: PathBuf,

    /// Capacity of the layout event channel.
    pub bus_capacity: usize,

    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout_secs: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auth_base_url: "http://127.0.0.1:8000/api/auth/".to_string(),
            api_base_url: "http://127.0.0.1:8000/api/".to_string(),
            token_path: "token/".to_string(),
            refresh_path: "token/refresh/".to_string(),
            blacklist_path: "token/blacklist/".to_string(),
            categories_path: "game-sounds/categories/".to_string(),
            categories_limit: DEFAULT_CATEGORIES_LIMIT,
            storage_path: PathBuf::from("data/soundboard.db"),
            bus_capacity: 16,
            request_timeout_secs: None,
        }
    }
}

impl StoreConfig {
    /// Build a config pointing both services at one origin, e.g. a test server.
    pub fn with_base_urls(auth_base_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] if the text is not valid TOML
    /// or a key has the wrong type.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::InvalidConfig {
            reason: e.to_string(),
        })
    }

    /// Load a config file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read, or
    /// [`StoreError::InvalidConfig`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `ENV_*` names.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_AUTH_URL).filter(|v| !v.is_empty()) {
            self.auth_base_url = url;
        }
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(path) = lookup(ENV_STORAGE).filter(|v| !v.is_empty()) {
            self.storage_path = PathBuf::from(path);
        }
    }

    /// Check that both base URLs parse and the bus can hold at least one event.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("auth_base_url", &self.auth_base_url),
            ("api_base_url", &self.api_base_url),
        ] {
            Url::parse(value).map_err(|e| StoreError::InvalidConfig {
                reason: format!("{name} {value:?}: {e}"),
            })?;
        }
        if self.bus_capacity == 0 {
            return Err(StoreError::InvalidConfig {
                reason: "bus_capacity must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The auth base URL, parsed and guaranteed to end in `/`.
    pub(crate) fn auth_base(&self) -> Result<Url> {
        parse_base(&self.auth_base_url)
    }

    /// The API base URL, parsed and guaranteed to end in `/`.
    pub(crate) fn api_base(&self) -> Result<Url> {
        parse_base(&self.api_base_url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{raw}/"))?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

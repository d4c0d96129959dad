//! Client configuration.
//!
//! Defaults match a local development backend. Mobile shells pass a JSON
//! config; desktop tools and tests can use environment overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const APP_NAME: &str = "Cureon";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const ENV_API_URL: &str = "CUREON_API_URL";
pub const ENV_SOCKET_URL: &str = "CUREON_SOCKET_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "CUREON_REQUEST_TIMEOUT_SECS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL {value}: {source}")]
    InvalidUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Unsupported URL scheme {0}, expected http or https")]
    UnsupportedScheme(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Tracing filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "cureon_core=info,cureon_gatt=info"
}

/// Camera direction requested for scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Delay between decode attempts; one display frame at 60 Hz
    pub frame_interval_ms: u64,
    /// Give up after this long; `None` scans until cancelled
    pub timeout_secs: Option<u64>,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing: FacingMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            timeout_secs: None,
            ideal_width: 1280,
            ideal_height: 720,
            facing: FacingMode::Environment,
        }
    }
}

impl ScanConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: u64,
    /// Readings per bulk upload
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            batch_size: 100,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub api_version: String,
    /// Chat transport; falls back to the API base
    pub socket_url: Option<String>,
    pub request_timeout_secs: u64,
    pub scan: ScanConfig,
    pub sync: SyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4000".to_string(),
            api_version: "v1".to_string(),
            socket_url: None,
            request_timeout_secs: 30,
            scan: ScanConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with `CUREON_*` environment overrides applied.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ClientConfig::default();
        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url;
        }
        if let Some(url) = lookup(ENV_SOCKET_URL) {
            config.socket_url = Some(url);
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            config.request_timeout_secs = secs
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_REQUEST_TIMEOUT,
                    value: secs,
                })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        parse_http_url(&self.api_base_url)?;
        if let Some(socket) = &self.socket_url {
            parse_http_url(socket)?;
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "request_timeout_secs",
                value: "0".to_string(),
            });
        }
        if self.sync.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.batch_size",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// `{base}/api/{version}`, the root every endpoint path hangs off.
    pub fn api_root(&self) -> ConfigResult<Url> {
        let base = parse_http_url(&self.api_base_url)?;
        let root = format!(
            "{}/api/{}",
            base.as_str().trim_end_matches('/'),
            self.api_version.trim_matches('/')
        );
        Url::parse(&root).map_err(|source| ConfigError::InvalidUrl { value: root, source })
    }

    pub fn socket_url(&self) -> &str {
        self.socket_url.as_deref().unwrap_or(&self.api_base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_http_url(value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        value: value.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

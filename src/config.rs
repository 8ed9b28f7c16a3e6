//! Client configuration: API base URL, request timeout, poll interval and the
//! directory holding durable client state. Values come from CLI flags or their
//! `SENTINEL_*` environment variables; nothing here is secret.

use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API base URL is empty")]
    EmptyBaseUrl,
    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("unsupported API base URL scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub state_dir: PathBuf,
}

impl AppConfig {
    /// Builds a config with a validated base URL and default timings.
    ///
    /// # Errors
    /// Returns an error if `api_base_url` is empty, unparsable or not http(s).
    pub fn new(api_base_url: &str, state_dir: PathBuf) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url)?,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            state_dir,
        })
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECONDS),
            state_dir: default_state_dir(),
        }
    }
}

/// Trims the base URL, drops trailing slashes and checks it is an http(s) URL.
///
/// # Errors
/// Returns an error if the value is empty, unparsable or uses another scheme.
pub fn normalize_base_url(value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyBaseUrl);
    }

    let parsed = Url::parse(trimmed).map_err(|err| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason: err.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(trimmed.to_string()),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

/// Joins a base URL and a path with exactly one slash between them.
#[must_use]
pub fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

/// `<config dir>/sentinel`, falling back to the temp dir on hosts without one.
#[must_use]
pub fn default_state_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("sentinel")
}

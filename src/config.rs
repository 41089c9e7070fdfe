//! Client configuration
//!
//! All tunables that the SDK needs (base URL, poll timing, TLS policy) live in
//! one immutable [`ClientConfig`] that is handed to the transport and session
//! when they are built. Values come from defaults, environment variables, or a
//! JSON file.

use crate::distillr::error::{DistillrError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Production API root
pub const DEFAULT_BASE_URL: &str = "https://app.datadistillr.io/api";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_POLL_RETRIES: u32 = 20;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// API root, without trailing slash (e.g. https://app.datadistillr.io/api)
    pub base_url: String,

    /// Sleep between polls of a running query
    pub poll_interval: Duration,

    /// Retries allowed after the first poll before giving up.
    /// Shared by every page of one query.
    pub max_poll_retries: u32,

    /// Per-request timeout applied by the HTTP transport
    pub request_timeout: Duration,

    /// Skip TLS certificate verification (self-signed / dev deployments only)
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_retries: DEFAULT_MAX_POLL_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

/// On-disk form of the configuration. Durations are in seconds.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    poll_interval_secs: Option<f64>,
    max_poll_retries: Option<u32>,
    request_timeout_secs: Option<f64>,
    accept_invalid_certs: Option<bool>,
}

impl ClientConfig {
    /// Create a config pointing at `base_url` with default timing
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Create a config from environment variables, falling back to defaults
    ///
    /// Recognised variables:
    /// - `DATADISTILLR_URL`: API root
    /// - `DATADISTILLR_POLL_INTERVAL_SECS`: seconds between polls (fractions allowed)
    /// - `DATADISTILLR_MAX_POLL_RETRIES`: retry ceiling
    /// - `DATADISTILLR_REQUEST_TIMEOUT_SECS`: per-request timeout
    /// - `DATADISTILLR_ACCEPT_INVALID_CERTS`: `1`/`true` disables TLS verification
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("DATADISTILLR_URL") {
            config = config.with_base_url(url);
        }
        if let Some(raw) = lookup("DATADISTILLR_POLL_INTERVAL_SECS") {
            config.poll_interval = parse_secs("DATADISTILLR_POLL_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DATADISTILLR_MAX_POLL_RETRIES") {
            config.max_poll_retries = raw.trim().parse().map_err(|e| {
                DistillrError::Config(format!(
                    "DATADISTILLR_MAX_POLL_RETRIES='{}' is not a count: {}",
                    raw, e
                ))
            })?;
        }
        if let Some(raw) = lookup("DATADISTILLR_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = parse_secs("DATADISTILLR_REQUEST_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("DATADISTILLR_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_flag("DATADISTILLR_ACCEPT_INVALID_CERTS", &raw)?;
        }

        Ok(config)
    }

    /// Load a config from a JSON file. Missing fields keep their defaults.
    ///
    /// ```json
    /// { "base_url": "https://dev.example/api", "poll_interval_secs": 1.5 }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DistillrError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file: ConfigFile = serde_json::from_str(&raw).map_err(|e| {
            DistillrError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        let mut config = Self::default();
        if let Some(url) = file.base_url {
            config = config.with_base_url(url);
        }
        if let Some(secs) = file.poll_interval_secs {
            config.poll_interval = secs_to_duration("poll_interval_secs", secs)?;
        }
        if let Some(retries) = file.max_poll_retries {
            config.max_poll_retries = retries;
        }
        if let Some(secs) = file.request_timeout_secs {
            config.request_timeout = secs_to_duration("request_timeout_secs", secs)?;
        }
        if let Some(flag) = file.accept_invalid_certs {
            config.accept_invalid_certs = flag;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_poll_retries(mut self, retries: u32) -> Self {
        self.max_poll_retries = retries;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Absolute URL for an API path such as `queryBarrels/42`
    pub fn route(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Resolve a server-supplied link (next page, etc.) against the API root
    ///
    /// Standard URL reference rules apply: absolute and protocol-relative
    /// links replace the root, `/`-prefixed links replace its path, and bare
    /// relative links are appended below it.
    pub fn resolve_link(&self, link: &str) -> Result<String> {
        join_link(&format!("{}/", self.base_url), link)
    }
}

/// Resolve `link` as a URL reference relative to `base`
pub(crate) fn join_link(base: &str, link: &str) -> Result<String> {
    let base = reqwest::Url::parse(base)
        .map_err(|e| DistillrError::Config(format!("invalid base URL '{}': {}", base, e)))?;
    let joined = base.join(link).map_err(|e| {
        DistillrError::server(base.as_str(), format!("unresolvable link '{}': {}", link, e), None)
    })?;
    Ok(joined.to_string())
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    let secs: f64 = raw.trim().parse().map_err(|e| {
        DistillrError::Config(format!("{}='{}' is not a number of seconds: {}", key, raw, e))
    })?;
    secs_to_duration(key, secs)
}

fn secs_to_duration(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| DistillrError::Config(format!("{} must be a non-negative number, got {}", key, secs)))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(DistillrError::Config(format!(
            "{}='{}' is not a boolean",
            key, other
        ))),
    }
}

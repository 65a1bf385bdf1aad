//! Configuration management for the runtime and the agent.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Agent host address
    pub host: String,
    /// Agent port
    pub port: u16,
    /// Base URL of the storefront REST API
    pub api_base_url: String,
    /// Path of the lightweight health endpoint
    pub health_path: String,
    /// How often the monitor probes the backend
    pub probe_interval: Duration,
    /// Timeout of a single health probe
    pub probe_timeout: Duration,
    /// Timeout of a single mutation or replay
    pub request_timeout: Duration,
    /// Timeout of bulk fetches (cart and offer-less products)
    pub bulk_timeout: Duration,
    /// How long a notification stays visible
    pub notification_display: Duration,
    /// Age after which another client's drain lease is ignored
    pub drain_lease_ttl: Duration,
    /// Rejected replays tolerated before an entry is dropped
    pub max_replay_attempts: u32,
    /// Directory backing the durable key/value store
    pub storage_dir: PathBuf,
    /// Signed-in user, if known
    pub user_id: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            api_base_url: "http://localhost:3000".to_string(),
            health_path: "/api/health-check".to_string(),
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(3_000),
            request_timeout: Duration::from_millis(5_000),
            bulk_timeout: Duration::from_millis(10_000),
            notification_display: Duration::from_millis(5_000),
            drain_lease_ttl: Duration::from_millis(30_000),
            max_replay_attempts: 3,
            storage_dir: PathBuf::from(".storefront"),
            user_id: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or(defaults.api_base_url)
            .trim_end_matches('/')
            .to_string();

        let health_path = lookup("HEALTH_PATH").unwrap_or(defaults.health_path);

        let millis = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(raw) => positive(&raw, key).map(Duration::from_millis),
                None => Ok(default),
            }
        };

        let probe_interval = match lookup("PROBE_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(positive(&raw, "PROBE_INTERVAL_SECS")?),
            None => defaults.probe_interval,
        };

        let max_replay_attempts = match lookup("MAX_REPLAY_ATTEMPTS") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("MAX_REPLAY_ATTEMPTS"))?,
            None => defaults.max_replay_attempts,
        };

        Ok(Self {
            host,
            port,
            api_base_url,
            health_path,
            probe_interval,
            probe_timeout: millis("PROBE_TIMEOUT_MS", defaults.probe_timeout)?,
            request_timeout: millis("REQUEST_TIMEOUT_MS", defaults.request_timeout)?,
            bulk_timeout: millis("BULK_TIMEOUT_MS", defaults.bulk_timeout)?,
            notification_display: millis("NOTIFICATION_DISPLAY_MS", defaults.notification_display)?,
            drain_lease_ttl: millis("DRAIN_LEASE_TTL_MS", defaults.drain_lease_ttl)?,
            max_replay_attempts,
            storage_dir: lookup("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            user_id: lookup("USER_ID").filter(|id| !id.is_empty()),
        })
    }

    /// Full URL of the health endpoint.
    pub fn health_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.health_path)
    }
}

/// Parse a duration amount that must be greater than zero.
fn positive(raw: &str, key: &'static str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::InvalidNumber(key)),
        Ok(n) => Ok(n),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}

use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_millis(8000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid backend url '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },
    #[error("{key} must be a non-negative integer, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    #[error("REGEN_RECONCILE must be 'delay' or 'poll', got '{0}'")]
    InvalidStrategy(String),
    #[error("REGEN_POLL_INTERVAL_MS must be greater than zero")]
    ZeroPollInterval,
}

/// How the console learns that an accepted regeneration has landed.
///
/// The backend never pushes completion, so the default assumes the asset is visible
/// after a fixed delay. `Poll` checks the stored asset until it is newer than the
/// submission, bounded by `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    FixedDelay { delay: Duration },
    Poll { interval: Duration, timeout: Duration },
}

impl Default for Reconciliation {
    fn default() -> Self { Reconciliation::FixedDelay { delay: DEFAULT_RECONCILE_DELAY } }
}

impl Reconciliation {
    /// Longest time the workflow stays open after acceptance.
    pub fn horizon(&self) -> Duration {
        match self {
            Reconciliation::FixedDelay { delay } => *delay,
            Reconciliation::Poll { timeout, .. } => *timeout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub backend_url: Url,
    pub port: u16,
    pub reconciliation: Reconciliation,
    pub request_timeout: Duration,
}

impl ConsoleConfig {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend_url = parse_backend_url(&lookup("CONTENT_BACKEND_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()))?;
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };

        let reconciliation = match lookup("REGEN_RECONCILE").as_deref().map(str::trim) {
            None | Some("") | Some("delay") => Reconciliation::FixedDelay {
                delay: millis(&lookup, "REGEN_DELAY_MS", DEFAULT_RECONCILE_DELAY)?,
            },
            Some("poll") => {
                let interval = millis(&lookup, "REGEN_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL)?;
                if interval.is_zero() {
                    return Err(ConfigError::ZeroPollInterval);
                }
                Reconciliation::Poll { interval, timeout: millis(&lookup, "REGEN_POLL_TIMEOUT_MS", DEFAULT_POLL_TIMEOUT)? }
            }
            Some(other) => return Err(ConfigError::InvalidStrategy(other.to_string())),
        };

        let request_timeout = match lookup("BACKEND_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| ConfigError::InvalidNumber { key: "BACKEND_TIMEOUT_SECS", value: raw })?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self { backend_url, port, reconciliation, request_timeout })
    }

    /// Defaults pointed at an explicit backend; handy for tests against a fake server.
    pub fn for_backend(url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            backend_url: parse_backend_url(url)?,
            port: DEFAULT_PORT,
            reconciliation: Reconciliation::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_reconciliation(mut self, reconciliation: Reconciliation) -> Self {
        self.reconciliation = reconciliation;
        self
    }
}

fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::InvalidBackendUrl { url: raw.to_string(), reason: e.to_string() })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBackendUrl { url: raw.to_string(), reason: "expected an http(s) base url".into() });
    }
    Ok(url)
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map(Duration::from_millis).map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

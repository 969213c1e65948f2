//! Remote connection settings.

use std::time::Duration;

/// Exponential backoff for reconnecting a dropped log stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max: Duration::from_secs(30),
            max_retries: 6,
        }
    }
}

impl BackoffConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial.as_millis() as f64 * self.multiplier.powi(exp);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Configuration for `HttpRemote`.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// API root, e.g. `https://console.example.com/api/`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Organization slug sent in the `x-org-slug` header.
    pub org: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Pause between log pages while a run is still going.
    pub log_poll_interval: Duration,
    pub backoff: BackoffConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002/api/".to_string(),
            token: None,
            org: None,
            timeout: Duration::from_secs(30),
            log_poll_interval: Duration::from_secs(2),
            backoff: BackoffConfig::default(),
        }
    }
}

impl RemoteConfig {
    /// Read overrides from `FC_API_URL`, `FC_TOKEN`, `FC_ORG` and
    /// `FC_TIMEOUT_SECS`; anything unset keeps its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("FC_API_URL").filter(|s| !s.is_empty()) {
            config.base_url = url;
        }
        config.token = lookup("FC_TOKEN").filter(|s| !s.is_empty());
        config.org = lookup("FC_ORG").filter(|s| !s.is_empty());
        if let Some(raw) = lookup("FC_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => log::warn!("ignoring invalid FC_TIMEOUT_SECS={raw:?}"),
            }
        }
        config
    }
}

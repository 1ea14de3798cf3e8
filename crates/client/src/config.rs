use std::time::Duration;

use temba_migrate_core::{
    API_PATH_PREFIX, DEFAULT_BACKOFF_BASE_MS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_RETRIES,
};

/// Connection settings for one source instance. Built once at startup.
#[derive(Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    /// Minimum pause between two consecutive requests.
    pub throttle: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    /// Consecutive 429 responses tolerated for one page. `None` waits forever.
    pub max_rate_limit_waits: Option<u32>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("throttle", &self.throttle)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("backoff_base", &self.backoff_base)
            .field("max_rate_limit_waits", &self.max_rate_limit_waits)
            .finish()
    }
}

impl ClientConfig {
    /// Cleans the URL and key the way operators tend to paste them.
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: clean_api_url(base_url),
            api_key: clean_api_key(api_key),
            throttle: Duration::ZERO,
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            max_rate_limit_waits: None,
        }
    }

    #[must_use]
    pub const fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub const fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    #[must_use]
    pub const fn with_max_rate_limit_waits(mut self, waits: u32) -> Self {
        self.max_rate_limit_waits = Some(waits);
        self
    }
}

/// Strips trailing slashes and the `/api/v2` suffix, adding `https://` when no
/// scheme was given.
#[must_use]
pub fn clean_api_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(API_PATH_PREFIX).unwrap_or(trimmed).trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    }
}

/// Drops a leading `Token` scheme word and surrounding whitespace.
#[must_use]
pub fn clean_api_key(key: &str) -> String {
    let trimmed = key.trim();
    let without_scheme = match trimmed.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("token") => trimmed.get(5..).unwrap_or(""),
        _ => trimmed,
    };
    without_scheme.trim().to_owned()
}

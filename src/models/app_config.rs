use crate::constants::{
    DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_PORT, DEFAULT_REFRESH_INTERVAL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, PROVIDER_MAX_RETRIES, PROVIDER_RETRY_BASE_DELAY_MS, YAHOO_BASE_URL,
};
use crate::error::{Error, Result};
use crate::utils::{env_or, get_cache_dir, get_reference_data_dir};
use std::path::PathBuf;
use std::time::Duration;

/// Settings of the history cache and its refresher
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one CSV per cached series
    pub cache_root: PathBuf,

    /// Period of the scheduled refresher
    pub refresh_interval: Duration,

    /// Upper bound on a single provider call, retries included
    pub fetch_timeout: Duration,

    /// Upper bound on one HTTP attempt within a provider call
    pub request_timeout: Duration,
}

impl CacheConfig {
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache_root,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Longest a provider call can take when every attempt times out and
    /// every backoff draws the maximum jitter
    pub fn retry_budget(&self) -> Duration {
        let base = Duration::from_millis(PROVIDER_RETRY_BASE_DELAY_MS);
        let backoff: Duration = (1..PROVIDER_MAX_RETRIES)
            .map(|attempt| base * (2u32.pow(attempt - 1) + 1))
            .sum();
        self.request_timeout * PROVIDER_MAX_RETRIES + backoff
    }

    /// Check the timeouts leave room for every retry
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() || self.fetch_timeout.is_zero() {
            return Err(Error::Config("Timeouts must be positive".to_string()));
        }
        if self.retry_budget() > self.fetch_timeout {
            return Err(Error::Config(format!(
                "FETCH_TIMEOUT_SECS ({}s) is shorter than {} attempts of REQUEST_TIMEOUT_SECS ({}s) plus backoff ({}s)",
                self.fetch_timeout.as_secs(),
                PROVIDER_MAX_RETRIES,
                self.request_timeout.as_secs(),
                self.retry_budget().as_secs()
            )));
        }
        Ok(())
    }
}

/// Process-wide configuration assembled from the environment and CLI flags
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache: CacheConfig,

    /// Directory with `all_*.json` instrument files and `gics.json`
    pub reference_data_dir: PathBuf,

    /// Base URL of the market-data provider
    pub provider_base_url: String,

    /// HTTP listen port
    pub port: u16,
}

impl AppConfig {
    /// Build configuration from environment variables with defaults
    pub fn from_env() -> Result<Self> {
        let refresh_secs: u64 = env_or("REFRESH_INTERVAL_SECS", DEFAULT_REFRESH_INTERVAL_SECS)?;
        let timeout_secs: u64 = env_or("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS)?;
        let request_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let port: u16 = env_or("PORT", DEFAULT_PORT)?;

        if refresh_secs == 0 {
            return Err(Error::Config("REFRESH_INTERVAL_SECS must be positive".to_string()));
        }

        let cache = CacheConfig::new(get_cache_dir())
            .with_refresh_interval(Duration::from_secs(refresh_secs))
            .with_fetch_timeout(Duration::from_secs(timeout_secs))
            .with_request_timeout(Duration::from_secs(request_secs));
        cache.validate()?;

        let provider_base_url = std::env::var("YAHOO_BASE_URL")
            .unwrap_or_else(|_| YAHOO_BASE_URL.to_string());

        Ok(Self {
            cache,
            reference_data_dir: get_reference_data_dir(),
            provider_base_url,
            port,
        })
    }
}

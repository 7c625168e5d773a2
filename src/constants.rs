//! Shared constants
//!
//! ## Cache file format
//!
//! One CSV per series, rewritten wholesale on every update:
//!
//! ```text
//! Datetime,Open,High,Low,Close,Adj Close,Volume
//! 2024-01-02 00:00:00,187.15,188.44,183.89,185.64,184.94,82488700
//! ```
//!
//! Missing values are written as empty fields.

/// Header of persisted series files
pub const CACHE_CSV_HEADER: [&str; 7] = [
    "Datetime", "Open", "High", "Low", "Close", "Adj Close", "Volume",
];

/// Column indices of persisted series files (0-indexed)
pub mod csv_column {
    pub const TIME: usize = 0;
    pub const OPEN: usize = 1;
    pub const HIGH: usize = 2;
    pub const LOW: usize = 3;
    pub const CLOSE: usize = 4;
    pub const ADJ_CLOSE: usize = 5;
    pub const VOLUME: usize = 6;
}

/// Step past the latest cached bar when computing the next fetch start,
/// and between consecutive sub-windows
pub const FETCH_STEP_MINUTES: i64 = 1;

/// Default number of rows returned by the history endpoint
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Maximum number of rows returned by the history endpoint
pub const MAX_HISTORY_LIMIT: usize = 1000;

/// Default and maximum number of autocomplete suggestions
pub const DEFAULT_AUTOCOMPLETE_LIMIT: usize = 20;
pub const MAX_AUTOCOMPLETE_LIMIT: usize = 100;

/// Scheduled refresher period
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Upper bound on one provider call, retries included
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a single HTTP attempt inside a provider call
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 8;

pub const DEFAULT_PORT: u16 = 8000;

/// Yahoo Finance API root
pub const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Provider retry policy: attempt `n > 0` waits
/// `base * (2^(n-1) + jitter)` with jitter in `[0, 1)`
pub const PROVIDER_MAX_RETRIES: u32 = 3;
pub const PROVIDER_RETRY_BASE_DELAY_MS: u64 = 1000;

/// GICS taxonomy file inside the reference data directory
pub const GICS_FILE_NAME: &str = "gics.json";

/// Provider sector keys exposed on `/sectors`
pub const PROVIDER_SECTOR_KEYS: &[&str] = &[
    "basic-materials",
    "communication-services",
    "consumer-cyclical",
    "consumer-defensive",
    "energy",
    "financial-services",
    "healthcare",
    "industrials",
    "real-estate",
    "technology",
    "utilities",
];

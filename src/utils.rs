use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::str::FromStr;

/// Get history cache directory from environment variable or use default
pub fn get_cache_dir() -> PathBuf {
    std::env::var("CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/yfinance_cache"))
}

/// Get reference data directory (instrument and GICS files) from environment variable or use default
pub fn get_reference_data_dir() -> PathBuf {
    std::env::var("REFERENCE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data"))
}

/// Read a numeric environment variable, falling back to `default` when unset
pub fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            Error::Config(format!("{} must be a number, got '{}'", name, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a caller-supplied timestamp into naive UTC.
///
/// Offsets are stripped, not applied: `2024-01-02T10:00:00+02:00` becomes
/// `2024-01-02 10:00:00`. Dates without a time resolve to midnight.
pub fn parse_naive_timestamp(input: &str) -> Result<NaiveDateTime> {
    let s = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.naive_local());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }

    Err(Error::InvalidInput(format!(
        "Invalid timestamp '{}'. Expected YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC 3339",
        input
    )))
}

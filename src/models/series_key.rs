use crate::error::{Error, Result};
use crate::models::Interval;
use std::fmt;

/// Extension of persisted series files
pub const SERIES_FILE_EXTENSION: &str = "csv";

/// Identity of one cached time series
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub symbol: String,
    pub interval: Interval,
}

impl SeriesKey {
    /// Build a key, rejecting symbols that cannot be used as a file name
    pub fn new(symbol: &str, interval: Interval) -> Result<Self> {
        Ok(Self {
            symbol: validate_symbol(symbol)?,
            interval,
        })
    }

    /// Storage name: `{symbol}_{interval}`
    pub fn storage_name(&self) -> String {
        format!("{}_{}", self.symbol, self.interval.as_str())
    }

    /// File name of the persisted series
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.storage_name(), SERIES_FILE_EXTENSION)
    }

    /// Recover the key from a storage name (file stem).
    ///
    /// Splits on the last underscore so symbols may contain underscores.
    pub fn parse_storage_name(stem: &str) -> Result<Self> {
        let (symbol, interval) = stem.rsplit_once('_').ok_or_else(|| {
            Error::Parse(format!("Storage name '{}' has no interval suffix", stem))
        })?;
        let interval = Interval::from_str(interval).map_err(Error::Parse)?;
        Self::new(symbol, interval).map_err(|e| Error::Parse(e.to_string()))
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.interval)
    }
}

/// Trimmed symbol, or InvalidInput if it is empty or has characters outside
/// ASCII alphanumerics and `.-=^_`
pub fn validate_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(Error::InvalidInput("Symbol must not be empty".to_string()));
    }
    if let Some(bad) = symbol.chars().find(|c| !is_symbol_char(*c)) {
        return Err(Error::InvalidInput(format!(
            "Invalid character '{}' in symbol '{}'",
            bad, symbol
        )));
    }
    Ok(symbol.to_string())
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '=' | '^' | '_')
}

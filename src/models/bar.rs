use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used in cache files and API responses
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One OHLCV record of a cached series.
///
/// Timestamps are naive UTC. Every numeric field may be missing: the
/// provider reports gaps as nulls, and non-finite values are dropped on the
/// way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time (naive UTC)
    pub time: NaiveDateTime,

    /// Opening price
    pub open: Option<f64>,

    /// Highest price
    pub high: Option<f64>,

    /// Lowest price
    pub low: Option<f64>,

    /// Closing price
    pub close: Option<f64>,

    /// Close adjusted for splits and dividends
    pub adj_close: Option<f64>,

    /// Traded volume
    pub volume: Option<f64>,
}

impl Bar {
    /// Create a bar with all price fields set
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close: Some(close),
            adj_close: Some(close),
            volume: Some(volume),
        }
    }

    /// Copy of this bar with NaN and infinities replaced by null
    pub fn cleaned(&self) -> Self {
        Self {
            time: self.time,
            open: finite(self.open),
            high: finite(self.high),
            low: finite(self.low),
            close: finite(self.close),
            adj_close: finite(self.adj_close),
            volume: finite(self.volume),
        }
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Bar as served by the history endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BarRow {
    #[serde(rename = "Datetime")]
    pub time: String,
    #[serde(rename = "Open")]
    pub open: Option<f64>,
    #[serde(rename = "High")]
    pub high: Option<f64>,
    #[serde(rename = "Low")]
    pub low: Option<f64>,
    #[serde(rename = "Close")]
    pub close: Option<f64>,
    #[serde(rename = "Adj Close")]
    pub adj_close: Option<f64>,
    #[serde(rename = "Volume")]
    pub volume: Option<f64>,
}

impl From<&Bar> for BarRow {
    fn from(bar: &Bar) -> Self {
        let bar = bar.cleaned();
        Self {
            time: bar.time.format(TIMESTAMP_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            adj_close: bar.adj_close,
            volume: bar.volume,
        }
    }
}

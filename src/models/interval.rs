use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sampling granularity of a cached series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1-minute bars
    #[serde(rename = "1m")]
    Minute1,
    /// 5-minute bars
    #[serde(rename = "5m")]
    Minute5,
    /// 15-minute bars
    #[serde(rename = "15m")]
    Minute15,
    /// 30-minute bars
    #[serde(rename = "30m")]
    Minute30,
    /// 1-hour bars
    #[serde(rename = "1h")]
    Hour1,
    /// Daily bars
    #[serde(rename = "1d")]
    Day1,
    /// Weekly bars
    #[serde(rename = "1wk")]
    Week1,
    /// Monthly bars
    #[serde(rename = "1mo")]
    Month1,
}

impl Interval {
    /// Canonical string, also used by the provider and in cache file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
        }
    }

    /// Maximum lookback relative to now. Also the largest range requested
    /// from the provider in one call.
    pub fn window(&self) -> Duration {
        match self {
            Interval::Minute1 => Duration::days(7),
            Interval::Minute5 => Duration::days(30),
            Interval::Minute15 | Interval::Minute30 => Duration::days(60),
            Interval::Hour1 => Duration::days(730),
            Interval::Day1 | Interval::Week1 | Interval::Month1 => Duration::days(3650),
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "30m" => Ok(Interval::Minute30),
            "1h" => Ok(Interval::Hour1),
            "1d" => Ok(Interval::Day1),
            "1wk" => Ok(Interval::Week1),
            "1mo" => Ok(Interval::Month1),
            _ => Err(format!(
                "Invalid interval: {}. Valid options: {}",
                s,
                Self::all().iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
            )),
        }
    }

    /// Get all available intervals
    pub fn all() -> Vec<Interval> {
        vec![
            Interval::Minute1,
            Interval::Minute5,
            Interval::Minute15,
            Interval::Minute30,
            Interval::Hour1,
            Interval::Day1,
            Interval::Week1,
            Interval::Month1,
        ]
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::Day1
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;

/// Cash dividend paid on `time`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dividend {
    #[serde(with = "naive_timestamp")]
    pub time: NaiveDateTime,
    pub amount: f64,
}

/// Stock split effective on `time`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Split {
    #[serde(with = "naive_timestamp")]
    pub time: NaiveDateTime,
    pub numerator: f64,
    pub denominator: f64,
    /// Provider ratio string, e.g. "4:1"
    pub ratio: String,
}

/// Dividends and splits of one symbol, each sorted ascending by time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorporateEvents {
    pub dividends: Vec<Dividend>,
    pub splits: Vec<Split>,
}

impl CorporateEvents {
    pub fn is_empty(&self) -> bool {
        self.dividends.is_empty() && self.splits.is_empty()
    }
}

pub(crate) mod naive_timestamp {
    use crate::models::bar::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::Serializer;

    pub fn serialize<S>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(TIMESTAMP_FORMAT).to_string())
    }
}

use chrono::NaiveDateTime;
use serde::Serialize;

/// Headline linked to a symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub uuid: String,
    pub title: String,
    pub publisher: String,
    pub link: String,
    #[serde(with = "crate::models::corporate_events::naive_timestamp")]
    pub published_at: NaiveDateTime,
    /// Provider content type, e.g. `STORY` or `VIDEO`
    #[serde(rename = "type")]
    pub kind: String,
    pub related_tickers: Vec<String>,
}

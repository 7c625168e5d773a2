//! Market-data provider abstraction.
//!
//! The history cache only talks to [`MarketDataProvider`]; the Yahoo client
//! in [`super::yahoo`] is the production implementation and tests plug in
//! in-memory fakes.

use crate::models::{Bar, CorporateEvents, Interval, NewsItem};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Errors raised by a provider implementation
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network failure or timeout talking to the provider
    #[error("Request failed: {0}")]
    Request(String),

    /// The provider answered with an error payload or status
    #[error("API error: {0}")]
    Api(String),

    /// The provider has nothing for this symbol/range
    #[error("No data available")]
    NoData,

    /// The response could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        ProviderError::Request(error.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(error: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(error.to_string())
    }
}

/// Source of OHLCV history and corporate events
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch bars for `symbol` at `interval` within `[start, end]` (naive UTC).
    ///
    /// An empty vector and [`ProviderError::NoData`] both mean "nothing here".
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, ProviderError>;

    /// Fetch the full dividend and split history of `symbol`
    async fn fetch_events(&self, _symbol: &str) -> Result<CorporateEvents, ProviderError> {
        Ok(CorporateEvents::default())
    }

    /// Recent headlines mentioning `symbol`, newest first
    async fn fetch_news(&self, _symbol: &str) -> Result<Vec<NewsItem>, ProviderError> {
        Ok(Vec::new())
    }

    /// Listed option expiration dates of `symbol`, ascending
    async fn fetch_option_expirations(&self, _symbol: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        Ok(Vec::new())
    }
}

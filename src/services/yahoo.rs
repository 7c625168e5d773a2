use crate::constants::{PROVIDER_MAX_RETRIES, PROVIDER_RETRY_BASE_DELAY_MS};
use crate::models::{Bar, CorporateEvents, Dividend, Interval, NewsItem, Split};
use crate::services::provider::{MarketDataProvider, ProviderError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Headlines requested per news lookup
const NEWS_COUNT: usize = 10;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// Chart API envelope
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Option<Indicators>,
    #[serde(default)]
    events: Option<ChartEvents>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, RawDividend>,
    #[serde(default)]
    splits: HashMap<String, RawSplit>,
}

#[derive(Debug, Deserialize)]
struct RawDividend {
    amount: f64,
    date: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSplit {
    date: i64,
    numerator: f64,
    denominator: f64,
    #[serde(default)]
    split_ratio: Option<String>,
}

/// Search API envelope, only the news part is read
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<RawNews>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNews {
    uuid: String,
    title: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    link: String,
    provider_publish_time: i64,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    related_tickers: Vec<String>,
}

/// Options API envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionChain,
}

#[derive(Debug, Deserialize)]
struct OptionChain {
    #[serde(default)]
    result: Option<Vec<OptionResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
}

/// Yahoo Finance client with retry and backoff
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    retry_delay: StdDuration,
}

impl YahooClient {
    /// Create a new client
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://query1.finance.yahoo.com`
    /// * `request_timeout` - Bound on each HTTP attempt; a provider call makes
    ///   up to [`PROVIDER_MAX_RETRIES`] of them
    pub fn new(base_url: &str, request_timeout: StdDuration) -> Result<Self, ProviderError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ProviderError::Request(format!(
                "Invalid base_url: must start with http:// or https://, got: '{}'",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        info!(base_url = %base_url, "Created Yahoo Finance client");

        Ok(Self {
            client,
            base_url,
            retry_delay: StdDuration::from_millis(PROVIDER_RETRY_BASE_DELAY_MS),
        })
    }

    /// Override the backoff base delay
    pub fn with_retry_delay(mut self, retry_delay: StdDuration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// GET `path`, retrying network errors, 429 and 5xx with exponential
    /// backoff. Other client errors fail immediately.
    async fn get_body(
        &self,
        symbol: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = ProviderError::Request("Max retries exceeded".to_string());

        for attempt in 0..PROVIDER_MAX_RETRIES {
            if attempt > 0 {
                let delay = self
                    .retry_delay
                    .mul_f64(2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>());
                debug!(
                    symbol,
                    attempt = attempt + 1,
                    delay_secs = delay.as_secs_f64(),
                    "Retrying provider request"
                );
                sleep(delay).await;
            }

            let response = match self.client.get(&url).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(symbol, attempt = attempt + 1, error = %e, "Provider request failed");
                    last_error = e.into();
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                warn!(symbol, %status, attempt = attempt + 1, "Provider throttled or failing, retrying");
                last_error = ProviderError::Api(format!("HTTP error: {}", status));
                continue;
            }
            if status == StatusCode::NOT_FOUND {
                return Err(ProviderError::NoData);
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(symbol, attempt = attempt + 1, error = %e, "Provider body read failed");
                    last_error = e.into();
                    continue;
                }
            };
            if !status.is_success() {
                return Err(ProviderError::Api(format!(
                    "HTTP error: {}: {}",
                    status,
                    truncate(&body, 200)
                )));
            }

            return Ok(body);
        }

        Err(last_error)
    }

    async fn get_chart(
        &self,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<ChartResult, ProviderError> {
        let body = self
            .get_body(symbol, &format!("/v8/finance/chart/{}", symbol), query)
            .await?;
        parse_chart(&body)
    }
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn parse_chart(body: &str) -> Result<ChartResult, ProviderError> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(ProviderError::NoData);
        }
        return Err(ProviderError::Api(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(ProviderError::NoData)
}

fn to_naive(timestamp: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.naive_utc())
}

fn value_at(values: &[Option<f64>], idx: usize) -> Option<f64> {
    values.get(idx).copied().flatten()
}

/// Convert chart arrays into bars. Rows with no price at all are dropped.
fn bars_from_chart(result: ChartResult) -> Vec<Bar> {
    let timestamps = result.timestamp.unwrap_or_default();
    let indicators = match result.indicators {
        Some(ind) => ind,
        None => return Vec::new(),
    };
    let quote = indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    timestamps
        .iter()
        .enumerate()
        .filter_map(|(idx, ts)| {
            let time = match to_naive(*ts) {
                Some(t) => t,
                None => {
                    warn!(timestamp = ts, "Invalid timestamp in chart response");
                    return None;
                }
            };
            let bar = Bar {
                time,
                open: value_at(&quote.open, idx),
                high: value_at(&quote.high, idx),
                low: value_at(&quote.low, idx),
                close: value_at(&quote.close, idx),
                adj_close: value_at(&adjclose, idx),
                volume: value_at(&quote.volume, idx),
            };
            let has_price = bar.open.is_some() || bar.high.is_some() || bar.low.is_some() || bar.close.is_some();
            has_price.then_some(bar)
        })
        .collect()
}

fn events_from_chart(result: ChartResult) -> CorporateEvents {
    let events = result.events.unwrap_or_default();

    let mut dividends: Vec<Dividend> = events
        .dividends
        .into_values()
        .filter_map(|d| to_naive(d.date).map(|time| Dividend { time, amount: d.amount }))
        .collect();
    dividends.sort_by_key(|d| d.time);

    let mut splits: Vec<Split> = events
        .splits
        .into_values()
        .filter_map(|s| {
            to_naive(s.date).map(|time| Split {
                time,
                ratio: s
                    .split_ratio
                    .clone()
                    .unwrap_or_else(|| format!("{}:{}", s.numerator, s.denominator)),
                numerator: s.numerator,
                denominator: s.denominator,
            })
        })
        .collect();
    splits.sort_by_key(|s| s.time);

    CorporateEvents { dividends, splits }
}

fn parse_news(body: &str) -> Result<Vec<NewsItem>, ProviderError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    let mut news: Vec<NewsItem> = response
        .news
        .into_iter()
        .filter_map(|n| {
            to_naive(n.provider_publish_time).map(|published_at| NewsItem {
                uuid: n.uuid,
                title: n.title,
                publisher: n.publisher,
                link: n.link,
                published_at,
                kind: n.kind,
                related_tickers: n.related_tickers,
            })
        })
        .collect();
    news.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    Ok(news)
}

fn parse_option_expirations(body: &str) -> Result<Vec<NaiveDate>, ProviderError> {
    let response: OptionsResponse = serde_json::from_str(body)?;

    if let Some(error) = response.option_chain.error {
        return Err(ProviderError::Api(format!(
            "{}: {}",
            error.code,
            error.description.unwrap_or_default()
        )));
    }

    let result = response
        .option_chain
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or(ProviderError::NoData)?;

    let mut dates: Vec<NaiveDate> = result
        .expiration_dates
        .into_iter()
        .filter_map(|ts| to_naive(ts).map(|t| t.date()))
        .collect();
    dates.sort();
    dates.dedup();
    Ok(dates)
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, ProviderError> {
        let query = [
            ("period1", start.and_utc().timestamp().to_string()),
            ("period2", end.and_utc().timestamp().to_string()),
            ("interval", interval.as_str().to_string()),
            ("includePrePost", "false".to_string()),
        ];

        debug!(symbol, %interval, %start, %end, "Fetching chart");
        let result = self.get_chart(symbol, &query).await?;
        let bars = bars_from_chart(result);

        debug!(symbol, %interval, count = bars.len(), "Fetched bars");
        Ok(bars)
    }

    async fn fetch_events(&self, symbol: &str) -> Result<CorporateEvents, ProviderError> {
        let query = [
            ("period1", "0".to_string()),
            ("period2", Utc::now().timestamp().to_string()),
            ("interval", Interval::Day1.as_str().to_string()),
            ("events", "div,splits".to_string()),
        ];

        let result = self.get_chart(symbol, &query).await?;
        Ok(events_from_chart(result))
    }

    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, ProviderError> {
        let query = [
            ("q", symbol.to_string()),
            ("quotesCount", "0".to_string()),
            ("newsCount", NEWS_COUNT.to_string()),
        ];

        let body = self.get_body(symbol, "/v1/finance/search", &query).await?;
        let news = parse_news(&body)?;
        debug!(symbol, count = news.len(), "Fetched news");
        Ok(news)
    }

    async fn fetch_option_expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        let body = self
            .get_body(symbol, &format!("/v7/finance/options/{}", symbol), &[])
            .await?;
        parse_option_expirations(&body)
    }
}

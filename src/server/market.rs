//! Provider passthrough routes: corporate actions, news, option expirations
//! and sector keys. Nothing here touches the history cache.

use crate::constants::PROVIDER_SECTOR_KEYS;
use crate::error::{AppError, Result};
use crate::models::series_key::validate_symbol;
use crate::models::{CorporateEvents, Dividend, NewsItem, Split};
use crate::server::AppState;
use crate::services::ProviderError;
use axum::extract::{Json, Path, State};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct DividendsResponse {
    pub symbol: String,
    pub dividends: Vec<Dividend>,
}

#[derive(Debug, Serialize)]
pub struct SplitsResponse {
    pub symbol: String,
    pub splits: Vec<Split>,
}

#[derive(Debug, Serialize)]
pub struct ActionsResponse {
    pub symbol: String,
    #[serde(flatten)]
    pub events: CorporateEvents,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub symbol: String,
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub symbol: String,
    pub expirations: Vec<NaiveDate>,
}

/// Run one provider call under the fetch timeout; `NoData` becomes empty
async fn provider_call<T, F>(app_state: &AppState, symbol: &str, call: F) -> Result<T>
where
    T: Default,
    F: Future<Output = std::result::Result<T, ProviderError>>,
{
    let timeout = app_state.history.config().fetch_timeout;

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(ProviderError::NoData)) => Ok(T::default()),
        Ok(Err(e)) => Err(AppError::Upstream(format!("{}: {}", symbol, e))),
        Err(_) => Err(AppError::Upstream(format!(
            "{}: provider did not answer within {}s",
            symbol,
            timeout.as_secs()
        ))),
    }
}

async fn fetch_events(app_state: &AppState, symbol: &str) -> Result<(String, CorporateEvents)> {
    let symbol = validate_symbol(symbol)?;
    let events = provider_call(app_state, &symbol, app_state.provider.fetch_events(&symbol)).await?;
    Ok((symbol, events))
}

fn not_found(kind: &str, symbol: &str) -> AppError {
    AppError::NotFound(format!("No {} found for {}", kind, symbol))
}

/// GET /dividends/{symbol}
#[instrument(skip(app_state))]
pub async fn dividends_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<DividendsResponse>> {
    let (symbol, events) = fetch_events(&app_state, &symbol).await?;
    if events.dividends.is_empty() {
        return Err(not_found("dividends", &symbol));
    }
    Ok(Json(DividendsResponse {
        symbol,
        dividends: events.dividends,
    }))
}

/// GET /splits/{symbol}
#[instrument(skip(app_state))]
pub async fn splits_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<SplitsResponse>> {
    let (symbol, events) = fetch_events(&app_state, &symbol).await?;
    if events.splits.is_empty() {
        return Err(not_found("splits", &symbol));
    }
    Ok(Json(SplitsResponse {
        symbol,
        splits: events.splits,
    }))
}

/// GET /actions/{symbol} - Dividends and splits together
#[instrument(skip(app_state))]
pub async fn actions_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<ActionsResponse>> {
    let (symbol, events) = fetch_events(&app_state, &symbol).await?;
    if events.is_empty() {
        return Err(not_found("corporate actions", &symbol));
    }
    Ok(Json(ActionsResponse { symbol, events }))
}

/// GET /news/{symbol} - Recent headlines, newest first
#[instrument(skip(app_state))]
pub async fn news_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<NewsResponse>> {
    let symbol = validate_symbol(&symbol)?;
    let news = provider_call(&app_state, &symbol, app_state.provider.fetch_news(&symbol)).await?;
    if news.is_empty() {
        return Err(not_found("news", &symbol));
    }
    Ok(Json(NewsResponse { symbol, news }))
}

/// GET /options/{symbol} - Listed option expiration dates
#[instrument(skip(app_state))]
pub async fn options_handler(
    State(app_state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<OptionsResponse>> {
    let symbol = validate_symbol(&symbol)?;
    let expirations = provider_call(
        &app_state,
        &symbol,
        app_state.provider.fetch_option_expirations(&symbol),
    )
    .await?;
    if expirations.is_empty() {
        return Err(not_found("options expirations", &symbol));
    }
    Ok(Json(OptionsResponse { symbol, expirations }))
}

/// GET /sectors - Provider sector keys
pub async fn sectors_handler() -> Json<Value> {
    Json(json!({ "sectors": PROVIDER_SECTOR_KEYS }))
}

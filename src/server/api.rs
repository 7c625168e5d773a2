use crate::constants::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};
use crate::error::{AppError, Result};
use crate::models::{Interval, SeriesKey};
use crate::server::ApiQuery;
use crate::services::{HealthStats, HistoryRequest, SharedHealthStats, SharedHistoryCache, StartBound};
use crate::utils::parse_naive_timestamp;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{Query, WithRejection};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// GET / - Service banner
pub async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "finbot market data API is running" }))
}

/// GET /health - Health statistics endpoint
#[instrument(skip(health_state, history))]
pub async fn health_handler(
    State(health_state): State<SharedHealthStats>,
    State(history): State<SharedHistoryCache>,
) -> impl IntoResponse {
    debug!("Received request for health stats");

    // Short timeout so a long refresher write never stalls the probe
    let health_snapshot = tokio::time::timeout(
        tokio::time::Duration::from_millis(100),
        health_state.read(),
    )
    .await;

    let mut health_stats = match health_snapshot {
        Ok(health) => health.clone(),
        Err(_) => {
            warn!("Health stats lock timeout, using defaults");
            HealthStats::default()
        }
    };

    match history.cached_keys().await {
        Ok(keys) => health_stats.cached_series_count = keys.len(),
        Err(e) => warn!(error = %e, "Failed to count cached series"),
    }
    health_stats.uptime_secs = health_stats.started_at.elapsed().as_secs();
    health_stats.current_system_time = Utc::now().to_rfc3339();

    (StatusCode::OK, Json(health_stats)).into_response()
}

/// Query parameters for /history/{symbol}
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HistoryQuery {
    /// 1m, 5m, 15m, 30m, 1h, 1d (default), 1wk, 1mo
    pub interval: Option<String>,

    /// `auto` (default) or a timestamp; clamped to the interval window
    pub start: Option<String>,

    /// Timestamp, defaults to now
    pub end: Option<String>,

    /// Rows in the preview, 1..=1000 (default 100)
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub symbol: String,
    pub interval: String,
    /// Size of the full cached series
    pub count: usize,
    /// JSON-encoded array of rows, newest first
    pub preview: String,
}

impl HistoryQuery {
    fn into_request(self, symbol: &str) -> Result<HistoryRequest> {
        let interval = match self.interval.as_deref() {
            Some(raw) => Interval::from_str(raw).map_err(AppError::InvalidInput)?,
            None => Interval::default(),
        };

        let limit = self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(AppError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_HISTORY_LIMIT
            )));
        }

        let end = self
            .end
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_naive_timestamp)
            .transpose()?;

        Ok(HistoryRequest {
            key: SeriesKey::new(symbol, interval)?,
            start: StartBound::parse(self.start.as_deref())?,
            end,
            limit,
        })
    }
}

/// GET /history/{symbol} - Cached OHLCV history, gap-filled up to `end`
///
/// Examples:
/// - /history/AAPL (daily, full window, 100 newest rows)
/// - /history/MSFT?interval=1h&start=2024-01-01&limit=500
/// - /history/EURUSD=X?interval=5m&start=auto
#[instrument(skip(history))]
pub async fn history_handler(
    State(history): State<SharedHistoryCache>,
    Path(symbol): Path<String>,
    WithRejection(Query(params), _): ApiQuery<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    let request = params.into_request(&symbol)?;
    let view = history.get_series(&request).await?;

    let preview = serde_json::to_string(&view.rows).map_err(|e| AppError::Formatting(e.to_string()))?;

    info!(
        symbol = %request.key.symbol,
        interval = %request.key.interval,
        count = view.count,
        rows = view.rows.len(),
        "Returning history"
    );

    Ok(Json(HistoryResponse {
        symbol: request.key.symbol,
        interval: request.key.interval.to_string(),
        count: view.count,
        preview,
    }))
}

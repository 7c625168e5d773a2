pub mod api;
pub mod gics;
pub mod market;
pub mod reference;

use crate::error::{AppError, Result};
use crate::models::AppConfig;
use crate::services::{
    HealthStats, HistoryCache, MarketDataProvider, ReferenceStore, SharedHealthStats, SharedHistoryCache,
    SharedReferenceStore, SharedTaxonomyStore, TaxonomyStore,
};
use axum::{extract::FromRef, http::Method, routing::get, Router};
use axum_extra::extract::{Query, WithRejection};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Query extractor whose rejections render as JSON errors
pub type ApiQuery<T> = WithRejection<Query<T>, AppError>;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub history: SharedHistoryCache,
    pub reference: SharedReferenceStore,
    pub taxonomy: SharedTaxonomyStore,
    pub provider: Arc<dyn MarketDataProvider>,
    pub health_stats: SharedHealthStats,
}

impl AppState {
    /// Wire every store from `config` around one provider
    pub fn new(config: &AppConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            history: Arc::new(HistoryCache::new(config.cache.clone(), provider.clone())),
            reference: Arc::new(ReferenceStore::new(config.reference_data_dir.clone())),
            taxonomy: Arc::new(TaxonomyStore::new(config.reference_data_dir.clone())),
            provider,
            health_stats: Arc::new(RwLock::new(HealthStats::default())),
        }
    }
}

// FromRef implementations to extract specific state components
impl FromRef<AppState> for SharedHistoryCache {
    fn from_ref(app_state: &AppState) -> SharedHistoryCache {
        app_state.history.clone()
    }
}

impl FromRef<AppState> for SharedReferenceStore {
    fn from_ref(app_state: &AppState) -> SharedReferenceStore {
        app_state.reference.clone()
    }
}

impl FromRef<AppState> for SharedTaxonomyStore {
    fn from_ref(app_state: &AppState) -> SharedTaxonomyStore {
        app_state.taxonomy.clone()
    }
}

impl FromRef<AppState> for SharedHealthStats {
    fn from_ref(app_state: &AppState) -> SharedHealthStats {
        app_state.health_stats.clone()
    }
}

/// Build the router with every route, CORS and request tracing
pub fn create_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/history/{symbol}", get(api::history_handler))
        .route("/dividends/{symbol}", get(market::dividends_handler))
        .route("/splits/{symbol}", get(market::splits_handler))
        .route("/actions/{symbol}", get(market::actions_handler))
        .route("/news/{symbol}", get(market::news_handler))
        .route("/options/{symbol}", get(market::options_handler))
        .route("/sectors", get(market::sectors_handler))
        .route("/instruments/types", get(reference::types_handler))
        .route("/instruments/{instrument_type}", get(reference::instruments_handler))
        .route("/autocomplete/{instrument_type}", get(reference::autocomplete_handler))
        .route("/filters/{instrument_type}", get(reference::filters_handler))
        .route("/gics/sectors", get(gics::sectors_handler))
        .route("/gics/hierarchy", get(gics::hierarchy_handler))
        .route("/gics/industry-groups", get(gics::industry_groups_handler))
        .route("/gics/industries", get(gics::industries_handler))
        .route("/gics/sub-industries", get(gics::sub_industries_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the axum server; returns once `shutdown` resolves and in-flight
/// requests have drained
pub async fn serve<F>(app_state: AppState, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!("Registering routes:");
    tracing::info!("  GET /history/{{symbol}}?interval=1d&start=auto&limit=100");
    tracing::info!("  GET /dividends|splits|actions|news|options/{{symbol}}, /sectors");
    tracing::info!("  GET /instruments/types, /instruments/{{type}}, /autocomplete/{{type}}, /filters/{{type}}");
    tracing::info!("  GET /gics/sectors|hierarchy|industry-groups|industries|sub-industries");
    tracing::info!("  GET /health");

    let app = create_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    tracing::info!("Server stopped");
    Ok(())
}

//! Instrument reference routes.

use crate::error::{AppError, Result};
use crate::server::ApiQuery;
use crate::services::{InstrumentQuery, ReferenceStore, SharedReferenceStore, Suggestion};
use axum::extract::{Json, Path, State};
use axum_extra::extract::{Query, WithRejection};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Query keys reserved for paging on /instruments/{type}
const PAGING_KEYS: [&str; 2] = ["limit", "offset"];

fn parse_paging(raw: Option<&String>, name: &str) -> Result<Option<usize>> {
    raw.map(|value| {
        value
            .trim()
            .parse::<usize>()
            .map_err(|_| AppError::InvalidInput(format!("{} must be a non-negative integer", name)))
    })
    .transpose()
}

/// Split raw query parameters into attribute filters and paging
fn build_query(mut params: BTreeMap<String, String>) -> Result<InstrumentQuery> {
    let limit = parse_paging(params.get("limit"), "limit")?;
    let offset = parse_paging(params.get("offset"), "offset")?.unwrap_or(0);
    for key in PAGING_KEYS {
        params.remove(key);
    }

    Ok(InstrumentQuery {
        filters: params,
        limit,
        offset,
    })
}

/// GET /instruments/types
pub async fn types_handler() -> Json<Value> {
    Json(json!({ "available": ReferenceStore::list_types() }))
}

/// GET /instruments/{type} - Filtered, paged instrument listing
///
/// Examples:
/// - /instruments/equities?country=united%20states&sector=technology&limit=50
/// - /instruments/etfs?family=vanguard&offset=100&limit=100
#[instrument(skip(reference))]
pub async fn instruments_handler(
    State(reference): State<SharedReferenceStore>,
    Path(instrument_type): Path<String>,
    WithRejection(Query(params), _): ApiQuery<BTreeMap<String, String>>,
) -> Result<Json<Value>> {
    let query = build_query(params)?;
    let page = reference.query(&instrument_type, &query).await?;
    debug!(count = page.count, returned = page.results.len(), "Instrument query served");

    Ok(Json(json!({
        "type": instrument_type.to_lowercase(),
        "count": page.count,
        "results": page.results,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

/// GET /autocomplete/{type}?q=&limit=
#[instrument(skip(reference))]
pub async fn autocomplete_handler(
    State(reference): State<SharedReferenceStore>,
    Path(instrument_type): Path<String>,
    WithRejection(Query(params), _): ApiQuery<AutocompleteQuery>,
) -> Result<Json<Vec<Suggestion>>> {
    let suggestions = reference
        .autocomplete(&instrument_type, &params.q, params.limit)
        .await?;
    Ok(Json(suggestions))
}

/// GET /filters/{type} - Attribute keys available on this class
#[instrument(skip(reference))]
pub async fn filters_handler(
    State(reference): State<SharedReferenceStore>,
    Path(instrument_type): Path<String>,
) -> Result<Json<Value>> {
    let fields = reference.filter_fields(&instrument_type).await?;
    Ok(Json(json!({
        "type": instrument_type.to_lowercase(),
        "fields": fields,
    })))
}

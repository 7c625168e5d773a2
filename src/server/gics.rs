//! GICS taxonomy routes.

use crate::error::Result;
use crate::models::{GicsEntry, GicsFilter, SectorNode};
use crate::server::ApiQuery;
use crate::services::SharedTaxonomyStore;
use axum::extract::{Json, State};
use axum_extra::extract::{Query, WithRejection};
use serde_json::{json, Value};
use tracing::instrument;

/// GET /gics/sectors
#[instrument(skip(taxonomy))]
pub async fn sectors_handler(State(taxonomy): State<SharedTaxonomyStore>) -> Result<Json<Value>> {
    let sectors = taxonomy.sectors().await?;
    Ok(Json(json!({ "sectors": sectors })))
}

/// GET /gics/hierarchy
#[instrument(skip(taxonomy))]
pub async fn hierarchy_handler(State(taxonomy): State<SharedTaxonomyStore>) -> Result<Json<Vec<SectorNode>>> {
    Ok(Json(taxonomy.hierarchy().await?))
}

/// GET /gics/industry-groups?sector=
#[instrument(skip(taxonomy))]
pub async fn industry_groups_handler(
    State(taxonomy): State<SharedTaxonomyStore>,
    WithRejection(Query(filter), _): ApiQuery<GicsFilter>,
) -> Result<Json<Vec<GicsEntry>>> {
    Ok(Json(taxonomy.industry_groups(&filter).await?))
}

/// GET /gics/industries?sector=&industry_group=
#[instrument(skip(taxonomy))]
pub async fn industries_handler(
    State(taxonomy): State<SharedTaxonomyStore>,
    WithRejection(Query(filter), _): ApiQuery<GicsFilter>,
) -> Result<Json<Vec<GicsEntry>>> {
    Ok(Json(taxonomy.industries(&filter).await?))
}

/// GET /gics/sub-industries?sector=&industry_group=&industry=
#[instrument(skip(taxonomy))]
pub async fn sub_industries_handler(
    State(taxonomy): State<SharedTaxonomyStore>,
    WithRejection(Query(filter), _): ApiQuery<GicsFilter>,
) -> Result<Json<Vec<GicsEntry>>> {
    Ok(Json(taxonomy.sub_industries(&filter).await?))
}

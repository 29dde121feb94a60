use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
};

use crate::app::dto::{MovementQuery, StockSummaryQuery};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/stock-summary", get(stock_summary))
        .route("/stock-movements", get(stock_movements))
}

pub async fn stock_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<StockSummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = services.reports.stock_summary(&query.filter()?).await?;
    Ok(Json(serde_json::json!({ "items": rows })))
}

/// Movement rows ignore `limit`/`offset`; the report covers the whole range.
pub async fn stock_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = services.reports.movement_report(&query.filter()?).await?;
    Ok(Json(serde_json::json!({ "items": rows })))
}

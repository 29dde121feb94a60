//! Stock ledger commands. The caller recorded on each movement is the
//! authenticated principal, never a body field.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use tallyerp_core::ProductId;
use tallyerp_inventory::{RecordAdjust, RecordIn, RecordOut};

use crate::app::dto::{self, MovementQuery, StockAdjustRequest, StockMovementRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/in", post(record_in))
        .route("/out", post(record_out))
        .route("/adjust", post(record_adjust))
        .route("/movements", get(search_movements))
}

pub async fn record_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<StockMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RecordIn {
        product_id: dto::parse_id::<ProductId>("product", &body.product_id)?,
        quantity: body.quantity,
        reason: body.reason,
        reference_id: body.reference_id,
        created_by: principal.user_id(),
    };
    let txn = services.ledger.record_in(cmd).await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

pub async fn record_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<StockMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RecordOut {
        product_id: dto::parse_id::<ProductId>("product", &body.product_id)?,
        quantity: body.quantity,
        reason: body.reason,
        reference_id: body.reference_id,
        created_by: principal.user_id(),
    };
    let txn = services.ledger.record_out(cmd).await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

pub async fn record_adjust(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<StockAdjustRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = RecordAdjust {
        product_id: dto::parse_id::<ProductId>("product", &body.product_id)?,
        quantity: body.quantity,
        reason: body.reason,
        created_by: principal.user_id(),
    };
    let txn = services.ledger.record_adjust(cmd).await?;
    Ok((StatusCode::CREATED, Json(txn)))
}

pub async fn search_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<MovementQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter()?;
    let page = services.ledger.movements(&filter, query.pagination()).await?;
    Ok(Json(page))
}

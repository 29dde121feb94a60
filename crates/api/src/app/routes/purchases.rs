use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};

use tallyerp_core::{ProductId, PurchaseOrderId, PurchaseOrderItemId};

use crate::app::dto::{
    self, AddItemRequest, OrderQuery, PurchaseOrderRequest, StatusRequest, UpdateItemRequest,
};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/orders", get(search_orders).post(create_order))
        .route("/orders/:id", get(get_order).put(update_order))
        .route("/orders/:id/status", post(update_status))
        .route("/orders/:id/items", post(add_item))
        .route("/items/:id", put(update_item).delete(delete_item))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (supplier_id, lines, notes) = body.into_parts()?;
    let detail = services
        .orders
        .create(supplier_id, lines, notes, principal.user_id())
        .await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn search_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<OrderQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter()?;
    let page = services.orders.search(&filter, query.pagination()).await?;
    Ok(Json(page))
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderId>("purchase order", &id)?;
    Ok(Json(services.orders.get(id).await?))
}

pub async fn update_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<PurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderId>("purchase order", &id)?;
    let (supplier_id, lines, notes) = body.into_parts()?;
    let detail = services.orders.update(id, supplier_id, lines, notes).await?;
    Ok(Json(detail))
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderId>("purchase order", &id)?;
    let order = services
        .orders
        .update_status(id, body.status()?, principal.user_id())
        .await?;
    Ok(Json(order))
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderId>("purchase order", &id)?;
    let product_id = dto::parse_id::<ProductId>("product", &body.product_id)?;
    let item = services.orders.add_item(id, product_id, body.quantity).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderItemId>("purchase order item", &id)?;
    Ok(Json(services.orders.update_item(id, body.quantity).await?))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<PurchaseOrderItemId>("purchase order item", &id)?;
    services.orders.delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

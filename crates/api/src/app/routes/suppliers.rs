use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use tallyerp_core::SupplierId;

use crate::app::dto::{self, SupplierQuery, SupplierRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(search_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier).put(update_supplier).delete(delete_supplier),
        )
}

pub async fn create_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<SupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = services.suppliers.create(body.into()).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn search_suppliers(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<SupplierQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = services
        .suppliers
        .search(&query.filter(), query.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<SupplierId>("supplier", &id)?;
    Ok(Json(services.suppliers.get(id).await?))
}

pub async fn update_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<SupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<SupplierId>("supplier", &id)?;
    Ok(Json(services.suppliers.update(id, body.into()).await?))
}

pub async fn delete_supplier(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<SupplierId>("supplier", &id)?;
    services.suppliers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use tallyerp_core::ProductId;

use crate::app::dto::{self, ProductQuery, ProductRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(search_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/:id/stock", get(current_stock))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = services.catalog.create_product(body.into_draft()?).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn search_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.filter()?;
    let page = services
        .catalog
        .search_products(&filter, query.pagination())
        .await?;
    Ok(Json(page))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<ProductId>("product", &id)?;
    Ok(Json(services.catalog.get_product(id).await?))
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<ProductId>("product", &id)?;
    let product = services.catalog.update_product(id, body.into_draft()?).await?;
    Ok(Json(product))
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<ProductId>("product", &id)?;
    services.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<ProductId>("product", &id)?;
    Ok(Json(services.ledger.current_stock(id).await?))
}

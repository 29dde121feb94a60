use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use tallyerp_core::CategoryId;

use crate::app::dto::{self, CategoryRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = services.catalog.create_category(body.into()).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<impl IntoResponse, ApiError> {
    let items = services.catalog.list_categories().await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<CategoryId>("category", &id)?;
    Ok(Json(services.catalog.get_category(id).await?))
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<CategoryId>("category", &id)?;
    Ok(Json(services.catalog.update_category(id, body.into()).await?))
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = dto::parse_id::<CategoryId>("category", &id)?;
    services.catalog.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

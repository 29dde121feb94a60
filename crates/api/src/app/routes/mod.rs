use axum::{Router, routing::get};

pub mod categories;
pub mod products;
pub mod purchases;
pub mod reports;
pub mod stock;
pub mod suppliers;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/categories", categories::router())
        .nest("/products", products::router())
        .nest("/suppliers", suppliers::router())
        .nest("/stock", stock::router())
        .nest("/purchases", purchases::router())
        .nest("/reports", reports::router())
}

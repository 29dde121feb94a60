//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and the domain services handlers call
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request DTOs and query-string mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use tallyerp_auth::{Hs256JwtValidator, JwtValidator};
use tallyerp_core::DomainResult;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> DomainResult<Router> {
    let services = Arc::new(services::build_services(&config.storage).await?);
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));

    tracing::info!(backend = services.backend(), "application services ready");
    Ok(router(services, jwt))
}

/// Assemble the router around already-built services.
pub fn router(services: Arc<services::AppServices>, jwt: Arc<dyn JwtValidator>) -> Router {
    let auth_state = middleware::AuthState { jwt };

    // Protected routes: require a valid bearer token.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}

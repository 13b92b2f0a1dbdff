//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: authorizer, directory and optional Postgres writers
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router_with(services))
}

/// Router over already-built services.
pub fn router_with(services: Arc<services::AppServices>) -> Router {
    let principal_state = middleware::PrincipalState {
        directory: services.directory(),
    };

    // Protected routes: require a resolved principal.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            principal_state,
            middleware::principal_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .layer(Extension(services))
        .merge(protected)
}

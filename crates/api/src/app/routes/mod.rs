use axum::{routing::get, Router};

pub mod admin;
pub mod decisions;
pub mod system;

/// Router for all endpoints that require a resolved principal.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/authz", decisions::router())
        .nest("/admin", admin::router())
}

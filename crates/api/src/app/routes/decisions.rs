//! Decision endpoints for the current principal.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use nexus_auth::CapabilityMatrix;

use crate::app::dto::PermissionRequest;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/decide", post(decide))
        .route("/capabilities", get(capabilities))
}

/// POST /authz/decide - `{action, resource, scope?}` => `{allow, reason}`.
///
/// A denial is a successful answer (200); only malformed input is an error.
pub async fn decide(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PermissionRequest>,
) -> axum::response::Response {
    let p = match body.parse() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let decision = services.authorizer().decide_principal(
        principal.principal(),
        p.action,
        p.resource,
        p.scope,
    );

    (StatusCode::OK, Json(decision)).into_response()
}

/// GET /authz/capabilities - what the UI should show, hide or disable.
pub async fn capabilities(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let matrix = CapabilityMatrix::for_principal(services.authorizer(), principal.principal());
    (StatusCode::OK, Json(matrix)).into_response()
}

use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// 200 once authorization state is loaded, 503 before that.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    if services.is_ready() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "loading" })),
        )
    }
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let entry = services.user(&principal.user_id());
    let p = principal.principal();

    Json(serde_json::json!({
        "user_id": p.user_id.to_string(),
        "role": p.role,
        "role_display_name": p.role.display_name(),
        "status": p.status.as_str(),
        "department": p.department,
        "name": entry.as_ref().map(|e| e.display_name.clone()),
        "email": entry.map(|e| e.email),
    }))
}

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use nexus_auth::{AuthzError, DirectoryError, Reason};
use nexus_infra::RepositoryError;

use crate::app::services::AdminError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Denial body carrying the reason tag. A store outage is retryable, so it
/// is reported as 503 rather than 403.
pub fn denied(reason: Reason) -> axum::response::Response {
    let (status, code) = match reason {
        Reason::StoreUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        _ => (StatusCode::FORBIDDEN, "forbidden"),
    };
    (
        status,
        axum::Json(json!({
            "error": code,
            "reason": reason.as_str(),
        })),
    )
        .into_response()
}

pub fn authz_error_to_response(err: AuthzError) -> axum::response::Response {
    match err {
        AuthzError::InvalidInput { .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        AuthzError::PrincipalUnresolved(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        AuthzError::StoreUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        AuthzError::Forbidden(reason) => denied(reason),
    }
}

pub fn admin_error_to_response(err: AdminError) -> axum::response::Response {
    match err {
        AdminError::Authz(e) => authz_error_to_response(e),
        AdminError::Directory(DirectoryError::NotFound(id)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("user {id} not found"))
        }
        AdminError::Directory(DirectoryError::Unavailable(msg)) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        AdminError::Repository(RepositoryError::NotFound(msg)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", msg)
        }
        AdminError::Repository(e) => {
            tracing::error!(error = %e, "persistence failure during administration");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", e.to_string())
        }
    }
}

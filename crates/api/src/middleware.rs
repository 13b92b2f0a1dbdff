use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use nexus_auth::{DirectoryError, PrincipalDirectory};
use nexus_core::UserId;

use crate::context::PrincipalContext;

/// Header carrying the already-authenticated principal reference, set by the
/// upstream session layer.
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

#[derive(Clone)]
pub struct PrincipalState {
    pub directory: Arc<dyn PrincipalDirectory>,
}

pub async fn principal_middleware(
    State(state): State<PrincipalState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let user_id = extract_principal_id(req.headers())?;

    let principal = state.directory.resolve(&user_id).map_err(|err| match err {
        DirectoryError::NotFound(_) => {
            tracing::warn!(user_id = %user_id, "request for unknown principal");
            StatusCode::UNAUTHORIZED
        }
        DirectoryError::Unavailable(msg) => {
            tracing::error!(user_id = %user_id, error = %msg, "principal directory unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    })?;

    req.extensions_mut().insert(PrincipalContext::new(principal));

    Ok(next.run(req).await)
}

fn extract_principal_id(headers: &HeaderMap) -> Result<UserId, StatusCode> {
    let header = headers
        .get(PRINCIPAL_HEADER)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    header.trim().parse().map_err(|_| StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn missing_header_is_unauthorized() {
        assert_eq!(extract_principal_id(&HeaderMap::new()), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn malformed_id_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("owner@nexus.com"));
        assert_eq!(extract_principal_id(&headers), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn parses_uuid_with_surrounding_whitespace() {
        let id = UserId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            PRINCIPAL_HEADER,
            HeaderValue::from_str(&format!(" {id} ")).unwrap(),
        );
        assert_eq!(extract_principal_id(&headers), Ok(id));
    }
}

//! Administration of role-permission associations and role assignment,
//! plus decision explanations for debugging "why was this denied?".
//!
//! The whole router sits behind `authz::ADMINISTER`.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use nexus_auth::{Role, RolePermissionStore};

use crate::app::dto::{
    self, AssignRoleRequest, ChangeResponse, ExplainQuery, PermissionRequest, RoleResponse,
    StatusRequest,
};
use crate::app::{errors, services::AppServices};
use crate::authz::{self, ADMINISTER};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/roles", get(list_roles))
        .route("/roles/:role/permissions", get(role_permissions).post(grant_permission))
        .route("/roles/:role/permissions/revoke", post(revoke_permission))
        .route("/users", get(list_users))
        .route("/users/:user_id/role", put(assign_role))
        .route("/users/:user_id/status", put(set_status))
        .route("/explain/:user_id", get(explain))
        .route_layer(axum::middleware::from_fn_with_state(
            ADMINISTER,
            authz::require_permission,
        ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/roles - every role with its definition and grant count.
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let store = services.authorizer().store();
    let mut roles = Vec::with_capacity(Role::COUNT);
    for role in Role::ALL {
        let permissions = match store.permissions(*role) {
            Ok(p) => p.len(),
            Err(e) => return errors::authz_error_to_response(e.into()),
        };
        roles.push(RoleResponse {
            role: *role,
            display_name: role.display_name().to_string(),
            description: role.description().to_string(),
            home_resource: role.home_resource(),
            permissions,
        });
    }

    (StatusCode::OK, Json(serde_json::json!({ "roles": roles }))).into_response()
}

/// GET /admin/roles/:role/permissions - `ListPermissions(role)`.
pub async fn role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(role): Path<String>,
) -> axum::response::Response {
    let role = match dto::parse_role(&role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.authorizer().list_permissions(role) {
        Ok(permissions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "role": role, "permissions": permissions })),
        )
            .into_response(),
        Err(e) => errors::authz_error_to_response(e),
    }
}

/// POST /admin/roles/:role/permissions - `Grant`; idempotent.
pub async fn grant_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(role): Path<String>,
    Json(body): Json<PermissionRequest>,
) -> axum::response::Response {
    let role = match dto::parse_role(&role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let permission = match body.parse() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.grant(actor.user_id(), role, permission).await {
        Ok(changed) => (
            StatusCode::OK,
            Json(ChangeResponse {
                role,
                permission,
                changed,
            }),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// POST /admin/roles/:role/permissions/revoke - `Revoke`; idempotent.
pub async fn revoke_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(role): Path<String>,
    Json(body): Json<PermissionRequest>,
) -> axum::response::Response {
    let role = match dto::parse_role(&role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let permission = match body.parse() {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match services.revoke(actor.user_id(), role, permission).await {
        Ok(changed) => (
            StatusCode::OK,
            Json(ChangeResponse {
                role,
                permission,
                changed,
            }),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /admin/users - directory listing.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    (StatusCode::OK, Json(serde_json::json!({ "users": services.users() }))).into_response()
}

/// PUT /admin/users/:user_id/role - replace the principal's single role.
pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    Json(body): Json<AssignRoleRequest>,
) -> axum::response::Response {
    let user_id = match dto::parse_user_id(&user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let role = match dto::parse_role(&body.role) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    match services.assign_role(actor.user_id(), user_id, role).await {
        Ok(principal) => (
            StatusCode::OK,
            Json(serde_json::json!({ "principal": principal })),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// PUT /admin/users/:user_id/status - `{"status": "active" | "inactive"}`.
pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<PrincipalContext>,
    Path(user_id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> axum::response::Response {
    let user_id = match dto::parse_user_id(&user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let status = match dto::parse_status(&body.status) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match services.set_status(actor.user_id(), user_id, status).await {
        Ok(principal) => (
            StatusCode::OK,
            Json(serde_json::json!({ "principal": principal })),
        )
            .into_response(),
        Err(e) => errors::admin_error_to_response(e),
    }
}

/// GET /admin/explain/:user_id?action=&resource=&scope= - rule-by-rule trace.
pub async fn explain(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
    Query(query): Query<ExplainQuery>,
) -> axum::response::Response {
    let user_id = match dto::parse_user_id(&user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let p = match dto::parse_permission(&query.action, &query.resource, query.scope.as_deref()) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if services.user(&user_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "user not found");
    }

    let explanation = services
        .authorizer()
        .explain(&user_id, p.action, p.resource, p.scope);

    (StatusCode::OK, Json(serde_json::json!({ "explanation": explanation }))).into_response()
}

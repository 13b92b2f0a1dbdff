use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use nexus_auth::{Permission, PrincipalStatus, Resource, Role, parse_request};
use nexus_core::UserId;

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /authz/decide`; also used for grant/revoke.
#[derive(Debug, Deserialize)]
pub struct PermissionRequest {
    pub action: String,
    pub resource: String,
    #[serde(default)]
    pub scope: Option<String>,
}

impl PermissionRequest {
    pub fn parse(&self) -> Result<Permission, axum::response::Response> {
        parse_permission(&self.action, &self.resource, self.scope.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub action: String,
    pub resource: String,
    pub scope: Option<String>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub role: Role,
    pub display_name: String,
    pub description: String,
    pub home_resource: Option<Resource>,
    pub permissions: usize,
}

#[derive(Debug, Serialize)]
pub struct ChangeResponse {
    pub role: Role,
    pub permission: Permission,
    pub changed: bool,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_permission(
    action: &str,
    resource: &str,
    scope: Option<&str>,
) -> Result<Permission, axum::response::Response> {
    parse_request(action, resource, scope)
        .map(|(action, resource, scope)| Permission::new(action, resource, scope))
        .map_err(errors::authz_error_to_response)
}

pub fn parse_role(s: &str) -> Result<Role, axum::response::Response> {
    s.parse().map_err(errors::authz_error_to_response)
}

pub fn parse_user_id(s: &str) -> Result<UserId, axum::response::Response> {
    s.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid user id"))
}

pub fn parse_status(s: &str) -> Result<PrincipalStatus, axum::response::Response> {
    s.parse().map_err(|e: nexus_core::DomainError| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_input", e.to_string())
    })
}

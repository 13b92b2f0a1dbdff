//! Request-handling enforcement adapter.
//!
//! Handlers either call [`enforce`] before doing work, or sit behind the
//! [`require_permission`] route layer, which rejects before the handler runs.
//! Both go through the same `Authorizer` as every other adapter.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use nexus_auth::{Action, Authorizer, AuthzError, Decision, Resource, Scope};

use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

/// Check one permission for the principal of the current request.
pub fn enforce(
    authorizer: &Authorizer,
    principal: &PrincipalContext,
    action: Action,
    resource: Resource,
    scope: Scope,
) -> Result<Decision, AuthzError> {
    authorizer
        .decide_principal(principal.principal(), action, resource, scope)
        .into_result()
}

/// Permission a route group requires.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequiredPermission {
    pub action: Action,
    pub resource: Resource,
    pub scope: Scope,
}

impl RequiredPermission {
    pub const fn new(action: Action, resource: Resource, scope: Scope) -> Self {
        Self {
            action,
            resource,
            scope,
        }
    }
}

/// Administration of roles and principals. Under the fixed rules only OWNER
/// holds setup access on EXECUTIVE, and no stored grant can widen it.
pub const ADMINISTER: RequiredPermission =
    RequiredPermission::new(Action::SetupAccess, Resource::Executive, Scope::Setup);

/// Route layer: `route_layer(from_fn_with_state(required, require_permission))`.
///
/// Expects `Arc<AppServices>` and `PrincipalContext` in the request
/// extensions (installed by the outer layers in `build_app`).
pub async fn require_permission(
    State(required): State<RequiredPermission>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(services) = req.extensions().get::<Arc<AppServices>>().cloned() else {
        tracing::error!("require_permission used without AppServices extension");
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "authorization not configured",
        );
    };
    let Some(principal) = req.extensions().get::<PrincipalContext>().cloned() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "no principal");
    };

    match enforce(
        services.authorizer(),
        &principal,
        required.action,
        required.resource,
        required.scope,
    ) {
        Ok(_) => next.run(req).await,
        Err(err) => {
            tracing::info!(
                user_id = %principal.user_id(),
                role = %principal.role(),
                action = %required.action,
                resource = %required.resource,
                scope = %required.scope,
                error = %err,
                "request rejected by route guard"
            );
            errors::authz_error_to_response(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, Router, body::Body, routing::get};
    use tower::ServiceExt;

    use nexus_auth::{Principal, PrincipalStatus, Reason, Role, seed};

    use crate::config::ApiConfig;

    fn services() -> Arc<AppServices> {
        Arc::new(AppServices::in_memory(&ApiConfig::default()))
    }

    fn guarded(principal: Principal) -> Router {
        Router::new()
            .route("/guarded", get(|| async { "ok" }))
            .route_layer(axum::middleware::from_fn_with_state(
                ADMINISTER,
                require_permission,
            ))
            .layer(Extension(services()))
            .layer(Extension(PrincipalContext::new(principal)))
    }

    async fn status_for(principal: Principal) -> StatusCode {
        let req = axum::http::Request::builder()
            .uri("/guarded")
            .body(Body::empty())
            .unwrap();
        guarded(principal).oneshot(req).await.unwrap().status()
    }

    #[test]
    fn enforce_returns_the_deciding_rule() {
        let services = services();
        let ctx = PrincipalContext::new(Principal::new(seed::demo_user_id(Role::Auditor), Role::Auditor));

        let ok = enforce(services.authorizer(), &ctx, Action::Read, Resource::Financial, Scope::Any).unwrap();
        assert_eq!(ok.reason, Reason::AuditorReadOnly);

        let err = enforce(services.authorizer(), &ctx, Action::Edit, Resource::Financial, Scope::Any).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden(Reason::AuditorReadOnly));
    }

    #[tokio::test]
    async fn owner_passes_the_admin_guard() {
        let owner = Principal::new(seed::demo_user_id(Role::Owner), Role::Owner);
        assert_eq!(status_for(owner).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn everyone_else_is_rejected_before_the_handler() {
        for role in Role::ALL.iter().copied().filter(|r| *r != Role::Owner) {
            let p = Principal::new(seed::demo_user_id(role), role);
            assert_eq!(status_for(p).await, StatusCode::FORBIDDEN, "{role}");
        }
    }

    #[tokio::test]
    async fn inactive_owner_is_rejected() {
        let owner = Principal::new(seed::demo_user_id(Role::Owner), Role::Owner)
            .with_status(PrincipalStatus::Inactive);
        assert_eq!(status_for(owner).await, StatusCode::FORBIDDEN);
    }
}

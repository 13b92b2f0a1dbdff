use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use nexus_core::UserId;

use crate::cache::{CacheKey, DecisionCache};
use crate::policy::{self, Decision, Reason, Request, RuleTrace};
use crate::{
    Action, DirectoryError, EffectiveRoles, Permission, Principal, PrincipalDirectory, Resource,
    Role, RolePermissionStore, Scope, SingleRole, StoreError,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// Unknown action/resource/scope/role spelling. A caller bug, not a denial.
    #[error("invalid {kind}: '{value}'")]
    InvalidInput { kind: &'static str, value: String },

    #[error("principal {0} could not be resolved")]
    PrincipalUnresolved(String),

    /// Infrastructure failure; safe to retry with backoff.
    #[error("role-permission store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("forbidden ({0})")]
    Forbidden(Reason),
}

impl AuthzError {
    pub fn invalid_input(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidInput {
            kind,
            value: value.into(),
        }
    }
}

impl From<StoreError> for AuthzError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(msg) => AuthzError::StoreUnavailable(msg),
        }
    }
}

/// The single decision point shared by every enforcement adapter.
///
/// - No IO on the decision path (directory and store are in-memory views)
/// - No panics
/// - Fails closed
#[derive(Clone)]
pub struct Authorizer {
    directory: Arc<dyn PrincipalDirectory>,
    store: Arc<dyn RolePermissionStore>,
    cache: Option<Arc<DecisionCache>>,
    roles: Arc<dyn EffectiveRoles>,
}

impl core::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authorizer")
            .field("cache", &self.cache.as_ref().map(|c| c.stats()))
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        store: Arc<dyn RolePermissionStore>,
    ) -> Self {
        Self {
            directory,
            store,
            cache: None,
            roles: Arc::new(SingleRole),
        }
    }

    pub fn with_cache(mut self, cache: DecisionCache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_effective_roles(mut self, roles: Arc<dyn EffectiveRoles>) -> Self {
        self.roles = roles;
        self
    }

    pub fn store(&self) -> &Arc<dyn RolePermissionStore> {
        &self.store
    }

    pub fn cache(&self) -> Option<&DecisionCache> {
        self.cache.as_deref()
    }

    pub fn resolve(&self, user_id: &UserId) -> Result<Principal, AuthzError> {
        self.directory.resolve(user_id).map_err(|err| {
            match &err {
                DirectoryError::NotFound(_) => {
                    tracing::warn!(user_id = %user_id, "principal not found in directory")
                }
                DirectoryError::Unavailable(msg) => {
                    tracing::error!(user_id = %user_id, error = %msg, "principal directory unavailable")
                }
            }
            AuthzError::PrincipalUnresolved(err.to_string())
        })
    }

    /// `Decide(principalRef, action, resource, scope)`.
    pub fn decide(&self, user_id: &UserId, action: Action, resource: Resource, scope: Scope) -> Decision {
        match self.resolve(user_id) {
            Ok(principal) => self.decide_principal(&principal, action, resource, scope),
            Err(_) => Decision::deny(Reason::PrincipalUnresolved),
        }
    }

    /// Decide for a principal already carried in the session context.
    pub fn decide_principal(
        &self,
        principal: &Principal,
        action: Action,
        resource: Resource,
        scope: Scope,
    ) -> Decision {
        let decision = if !principal.is_active() {
            let req = Request::new(principal.role, action, resource, scope).inactive();
            policy::evaluate(&req, self.store.as_ref())
        } else {
            // Union over effective roles: the first allow wins.
            let roles = self.roles.effective_roles(principal);
            let mut first_deny = None;
            let mut allowed = None;
            for role in roles.iter() {
                let d = self.decide_role(*role, action, resource, scope);
                if d.allow {
                    allowed = Some(d);
                    break;
                }
                first_deny.get_or_insert(d);
            }
            allowed
                .or(first_deny)
                .unwrap_or(Decision::deny(Reason::NoGrant))
        };

        tracing::debug!(
            user_id = %principal.user_id,
            role = %principal.role,
            action = %action,
            resource = %resource,
            scope = %scope,
            allow = decision.allow,
            reason = %decision.reason,
            "authorization decision"
        );
        decision
    }

    /// Same as `decide`, but from unparsed spellings (`scope` defaults to `any`).
    pub fn decide_raw(
        &self,
        user_id: &UserId,
        action: &str,
        resource: &str,
        scope: Option<&str>,
    ) -> Result<Decision, AuthzError> {
        let (action, resource, scope) = parse_request(action, resource, scope)?;
        Ok(self.decide(user_id, action, resource, scope))
    }

    fn decide_role(&self, role: Role, action: Action, resource: Resource, scope: Scope) -> Decision {
        let req = Request::new(role, action, resource, scope);
        match &self.cache {
            Some(cache) => cache.get_or_compute(CacheKey::new(role, action, resource, scope), || {
                policy::evaluate(&req, self.store.as_ref())
            }),
            None => policy::evaluate(&req, self.store.as_ref()),
        }
    }

    /// Precompute the whole decision domain. No-op without a cache.
    pub fn warm_cache(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.warm(|k| {
                policy::evaluate(
                    &Request::new(k.role, k.action, k.resource, k.scope),
                    self.store.as_ref(),
                )
            }),
            None => 0,
        }
    }

    /// `Grant(role, action, resource, scope)`; idempotent. Returns whether anything changed.
    pub fn grant(
        &self,
        role: Role,
        action: Action,
        resource: Resource,
        scope: Scope,
    ) -> Result<bool, AuthzError> {
        let permission = Permission::new(action, resource, scope);
        let changed = self.store.grant(role, permission)?;
        self.invalidate(role);
        tracing::info!(role = %role, permission = %permission, changed, "permission granted");
        Ok(changed)
    }

    /// `Revoke(role, action, resource, scope)`; idempotent.
    pub fn revoke(
        &self,
        role: Role,
        action: Action,
        resource: Resource,
        scope: Scope,
    ) -> Result<bool, AuthzError> {
        let permission = Permission::new(action, resource, scope);
        let changed = self.store.revoke(role, permission)?;
        self.invalidate(role);
        tracing::info!(role = %role, permission = %permission, changed, "permission revoked");
        Ok(changed)
    }

    /// Drop cached decisions for `role` (e.g. after the store was reloaded).
    pub fn invalidate(&self, role: Role) {
        if let Some(cache) = &self.cache {
            cache.invalidate_role(role);
        }
    }

    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// `ListPermissions(role)`.
    pub fn list_permissions(&self, role: Role) -> Result<BTreeSet<Permission>, AuthzError> {
        Ok(self.store.permissions(role)?)
    }

    /// Explain why a decision was (or would be) made for a principal.
    ///
    /// Bypasses the cache so the trace reflects the current store.
    pub fn explain(
        &self,
        user_id: &UserId,
        action: Action,
        resource: Resource,
        scope: Scope,
    ) -> DecisionExplanation {
        let principal = match self.resolve(user_id) {
            Ok(p) => p,
            Err(_) => {
                let decision = Decision::deny(Reason::PrincipalUnresolved);
                return DecisionExplanation {
                    user_id: *user_id,
                    principal: None,
                    action,
                    resource,
                    scope,
                    decision,
                    trace: Vec::new(),
                    stored_grants: Vec::new(),
                    suggestions: suggestions(None, action, resource, scope, decision),
                };
            }
        };

        let mut req = Request::new(principal.role, action, resource, scope);
        if !principal.is_active() {
            req = req.inactive();
        }
        let (trace, decision) = policy::trace(&req, self.store.as_ref());
        let stored_grants: Vec<Permission> = self
            .store
            .permissions(principal.role)
            .map(|s| s.into_iter().collect())
            .unwrap_or_default();

        DecisionExplanation {
            user_id: *user_id,
            suggestions: suggestions(Some(principal.role), action, resource, scope, decision),
            principal: Some(principal),
            action,
            resource,
            scope,
            decision,
            trace,
            stored_grants,
        }
    }
}

/// Parse the wire spellings of a request; a missing or blank scope means `any`.
pub fn parse_request(
    action: &str,
    resource: &str,
    scope: Option<&str>,
) -> Result<(Action, Resource, Scope), AuthzError> {
    let action: Action = action.parse()?;
    let resource: Resource = resource.parse()?;
    let scope = match scope {
        Some(s) if !s.trim().is_empty() => s.parse()?,
        _ => Scope::Any,
    };
    Ok((action, resource, scope))
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Auditable account of one decision: answers "why was this allowed/denied?".
#[derive(Debug, Clone, Serialize)]
pub struct DecisionExplanation {
    pub user_id: UserId,
    pub principal: Option<Principal>,
    pub action: Action,
    pub resource: Resource,
    pub scope: Scope,
    pub decision: Decision,
    /// Every rule in order, with its outcome.
    pub trace: Vec<RuleTrace>,
    /// What the store currently associates with the principal's role.
    pub stored_grants: Vec<Permission>,
    pub suggestions: Vec<String>,
}

fn suggestions(
    role: Option<Role>,
    action: Action,
    resource: Resource,
    scope: Scope,
    decision: Decision,
) -> Vec<String> {
    if decision.allow {
        return Vec::new();
    }

    match decision.reason {
        Reason::PrincipalUnresolved => vec![
            "Verify the principal exists in the directory".to_string(),
            "Check that the session carries the correct principal reference".to_string(),
        ],
        Reason::PrincipalInactive => vec!["Reactivate the principal".to_string()],
        Reason::StoreUnavailable => {
            vec!["Retry once the role-permission store is reachable".to_string()]
        }
        Reason::NoGrant => {
            let role = role.map_or_else(|| "the principal's role".to_string(), |r| r.to_string());
            vec![format!(
                "Grant '{action}' on {resource} (scope '{scope}') to {role}"
            )]
        }
        Reason::SetupRestricted => {
            vec!["Configuration is reserved to OWNER and MANAGER; assign one of those roles".to_string()]
        }
        Reason::ExecutiveRestricted => vec![
            "Executive dashboards are read-only and limited to OWNER, MANAGER and FINANCE".to_string(),
        ],
        _ => vec![format!(
            "Fixed system policy ({}) denies this; a stored grant cannot override it",
            decision.reason
        )],
    }
}

//! Presentation-layer adapter.
//!
//! The client never re-implements the policy: it asks for a capability
//! matrix computed by the same `Authorizer` the request path enforces with,
//! and hides or disables controls from it.

use std::collections::BTreeMap;

use serde::Serialize;

use nexus_core::UserId;

use crate::{Action, Authorizer, Principal, Resource, Role, Scope};

/// How a control should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Affordance {
    Enabled,
    /// Module visible, action not permitted.
    Disabled,
    /// Module not visible at all.
    Hidden,
}

impl Affordance {
    fn from_decision(visible: bool, allow: bool) -> Self {
        match (visible, allow) {
            (false, _) => Affordance::Hidden,
            (true, true) => Affordance::Enabled,
            (true, false) => Affordance::Disabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self == Affordance::Enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleCapabilities {
    pub resource: Resource,
    /// Navigation entry shown (`read` at any scope).
    pub visible: bool,
    /// Day-to-day actions (`operation` scope).
    pub operations: BTreeMap<Action, Affordance>,
    pub reports: Affordance,
    pub sensitive_figures: Affordance,
    pub setup: Affordance,
}

impl ModuleCapabilities {
    pub fn operation(&self, action: Action) -> Affordance {
        self.operations
            .get(&action)
            .copied()
            .unwrap_or(Affordance::Hidden)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityMatrix {
    pub user_id: UserId,
    pub role: Role,
    pub modules: Vec<ModuleCapabilities>,
}

impl CapabilityMatrix {
    pub fn for_principal(authz: &Authorizer, principal: &Principal) -> Self {
        let modules = Resource::ALL
            .iter()
            .map(|resource| {
                let allowed = |action: Action, scope: Scope| {
                    authz
                        .decide_principal(principal, action, *resource, scope)
                        .allow
                };
                let visible = allowed(Action::Read, Scope::Any);

                let operations = [
                    Action::Create,
                    Action::Read,
                    Action::Edit,
                    Action::Delete,
                    Action::Approve,
                ]
                .into_iter()
                .map(|a| (a, Affordance::from_decision(visible, allowed(a, Scope::Operation))))
                .collect();

                ModuleCapabilities {
                    resource: *resource,
                    visible,
                    operations,
                    reports: Affordance::from_decision(visible, allowed(Action::Read, Scope::Report)),
                    sensitive_figures: Affordance::from_decision(
                        visible,
                        allowed(Action::ViewSensitive, Scope::Report),
                    ),
                    setup: Affordance::from_decision(
                        visible,
                        allowed(Action::SetupAccess, Scope::Setup),
                    ),
                }
            })
            .collect();

        Self {
            user_id: principal.user_id,
            role: principal.role,
            modules,
        }
    }

    pub fn module(&self, resource: Resource) -> Option<&ModuleCapabilities> {
        self.modules.iter().find(|m| m.resource == resource)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{InMemoryDirectory, SnapshotPermissionStore, seed};

    fn matrix(role: Role) -> CapabilityMatrix {
        let authz = Authorizer::new(
            Arc::new(InMemoryDirectory::new()),
            Arc::new(SnapshotPermissionStore::new(seed::bootstrap_snapshot())),
        );
        let principal = Principal::new(UserId::from_u128(1), role);
        CapabilityMatrix::for_principal(&authz, &principal)
    }

    #[test]
    fn staff_sees_modules_but_cannot_approve_or_configure() {
        let m = matrix(Role::Staff);
        let service = m.module(Resource::Service).unwrap();
        assert!(service.visible);
        assert_eq!(service.operation(Action::Create), Affordance::Enabled);
        assert_eq!(service.operation(Action::Approve), Affordance::Disabled);
        assert_eq!(service.reports, Affordance::Disabled);
        assert_eq!(service.setup, Affordance::Disabled);

        let executive = m.module(Resource::Executive).unwrap();
        assert!(!executive.visible);
        assert_eq!(executive.operation(Action::Read), Affordance::Hidden);
    }

    #[test]
    fn warehouse_reports_without_sensitive_figures() {
        let m = matrix(Role::Warehouse);
        let material = m.module(Resource::Material).unwrap();
        assert_eq!(material.reports, Affordance::Enabled);
        assert_eq!(material.sensitive_figures, Affordance::Disabled);
        assert_eq!(material.operation(Action::Delete), Affordance::Enabled);
    }

    #[test]
    fn matrix_agrees_with_request_path_decisions() {
        let authz = Authorizer::new(
            Arc::new(InMemoryDirectory::new()),
            Arc::new(SnapshotPermissionStore::new(seed::bootstrap_snapshot())),
        );
        for role in Role::ALL {
            let principal = Principal::new(UserId::from_u128(7), *role);
            let m = CapabilityMatrix::for_principal(&authz, &principal);
            for module in &m.modules {
                let read = authz.decide_principal(&principal, Action::Read, module.resource, Scope::Any);
                assert_eq!(module.visible, read.allow);
                if module.visible {
                    for (action, affordance) in &module.operations {
                        let d = authz.decide_principal(
                            &principal,
                            *action,
                            module.resource,
                            Scope::Operation,
                        );
                        assert_eq!(affordance.is_enabled(), d.allow);
                    }
                }
            }
        }
    }

    #[test]
    fn owner_has_everything_enabled() {
        let m = matrix(Role::Owner);
        for module in &m.modules {
            assert!(module.visible);
            assert!(module.operations.values().all(|a| a.is_enabled()));
            assert!(module.setup.is_enabled());
        }
    }
}

//! Policy evaluator.
//!
//! Decisions are a pure function of `(role, active, action, resource, scope)`
//! plus, for the last step only, the role-permission store.
//!
//! The fast path is `PIPELINE`: ten fixed rules evaluated in order, first
//! match wins. Rule order is the policy; do not reorder. When no rule
//! matches, the stored associations decide (`StoredGrant` / `NoGrant`).
//! Store failures fail closed.

use serde::Serialize;

use crate::{Action, AuthzError, Permission, Resource, Role, RolePermissionStore, Scope};

/// Machine-readable tag of the rule that produced a decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Reason {
    PrincipalInactive,
    OwnerOverride,
    AuditorReadOnly,
    ExecutiveRestricted,
    ManagerBroadGrant,
    SetupRestricted,
    ReportRestricted,
    ApprovalRestricted,
    DeleteRestricted,
    /// Specialist acting on its own module.
    HomeModule,
    /// Read on a module the role does not own.
    CrossModuleRead,
    /// STAFF read/create/edit on SERVICE.
    StaffService,
    /// Specialist writing outside its own module.
    OperationRestricted,
    StoredGrant,
    NoGrant,
    PrincipalUnresolved,
    StoreUnavailable,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::PrincipalInactive => "PrincipalInactive",
            Reason::OwnerOverride => "OwnerOverride",
            Reason::AuditorReadOnly => "AuditorReadOnly",
            Reason::ExecutiveRestricted => "ExecutiveRestricted",
            Reason::ManagerBroadGrant => "ManagerBroadGrant",
            Reason::SetupRestricted => "SetupRestricted",
            Reason::ReportRestricted => "ReportRestricted",
            Reason::ApprovalRestricted => "ApprovalRestricted",
            Reason::DeleteRestricted => "DeleteRestricted",
            Reason::HomeModule => "HomeModule",
            Reason::CrossModuleRead => "CrossModuleRead",
            Reason::StaffService => "StaffService",
            Reason::OperationRestricted => "OperationRestricted",
            Reason::StoredGrant => "StoredGrant",
            Reason::NoGrant => "NoGrant",
            Reason::PrincipalUnresolved => "PrincipalUnresolved",
            Reason::StoreUnavailable => "StoreUnavailable",
        }
    }

    /// Infrastructure outcome rather than policy; never cached, may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Reason::StoreUnavailable | Reason::PrincipalUnresolved)
    }
}

impl core::fmt::Display for Reason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Decision {
    pub allow: bool,
    pub reason: Reason,
}

impl Decision {
    pub const fn allow(reason: Reason) -> Self {
        Self {
            allow: true,
            reason,
        }
    }

    pub const fn deny(reason: Reason) -> Self {
        Self {
            allow: false,
            reason,
        }
    }

    const fn when(allow: bool, reason: Reason) -> Self {
        Self { allow, reason }
    }

    /// `Ok(self)` when allowed, `Err(AuthzError::Forbidden)` otherwise.
    pub fn into_result(self) -> Result<Self, AuthzError> {
        if self.allow {
            Ok(self)
        } else {
            Err(AuthzError::Forbidden(self.reason))
        }
    }
}

/// Input to the evaluator, already resolved to a single role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub role: Role,
    pub active: bool,
    pub action: Action,
    pub resource: Resource,
    pub scope: Scope,
}

impl Request {
    pub fn new(role: Role, action: Action, resource: Resource, scope: Scope) -> Self {
        Self {
            role,
            active: true,
            action,
            resource,
            scope,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn permission(&self) -> Permission {
        Permission::new(self.action, self.resource, self.scope)
    }

    fn on_home_module(&self) -> bool {
        self.role.home_resource() == Some(self.resource)
    }
}

/// The fixed fast-path rules.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Rule {
    PrincipalInactive,
    OwnerOverride,
    AuditorReadOnly,
    ExecutiveRestricted,
    ManagerBroadGrant,
    SetupRestricted,
    ReportRestricted,
    ApprovalRestricted,
    DeleteRestricted,
    OperationalAccess,
}

/// Evaluation order. First rule returning a decision wins.
pub const PIPELINE: [Rule; 10] = [
    Rule::PrincipalInactive,
    Rule::OwnerOverride,
    Rule::AuditorReadOnly,
    Rule::ExecutiveRestricted,
    Rule::ManagerBroadGrant,
    Rule::SetupRestricted,
    Rule::ReportRestricted,
    Rule::ApprovalRestricted,
    Rule::DeleteRestricted,
    Rule::OperationalAccess,
];

impl Rule {
    /// `Some(decision)` if this rule settles the request, `None` to fall through.
    pub fn apply(self, req: &Request) -> Option<Decision> {
        use Action::*;
        use Resource::*;
        use Role::*;

        match self {
            Rule::PrincipalInactive => {
                (!req.active).then_some(Decision::deny(Reason::PrincipalInactive))
            }
            Rule::OwnerOverride => {
                (req.role == Owner).then_some(Decision::allow(Reason::OwnerOverride))
            }
            Rule::AuditorReadOnly => (req.role == Auditor).then_some(Decision::when(
                matches!(req.action, Read | ViewSensitive),
                Reason::AuditorReadOnly,
            )),
            Rule::ExecutiveRestricted => (req.resource == Executive).then_some(Decision::when(
                req.action == Read && matches!(req.role, Owner | Manager | Finance),
                Reason::ExecutiveRestricted,
            )),
            Rule::ManagerBroadGrant => {
                (req.role == Manager).then_some(Decision::allow(Reason::ManagerBroadGrant))
            }
            Rule::SetupRestricted => (req.scope == Scope::Setup || req.action == SetupAccess)
                .then_some(Decision::deny(Reason::SetupRestricted)),
            Rule::ReportRestricted => {
                (req.scope == Scope::Report || req.action == ViewSensitive).then(|| {
                    let allow = match (req.role, req.resource) {
                        (Finance, Financial) | (Marketing, Sales) => true,
                        (Warehouse, Material) => req.action != ViewSensitive,
                        _ => false,
                    };
                    Decision::when(allow, Reason::ReportRestricted)
                })
            }
            Rule::ApprovalRestricted => (req.action == Approve).then(|| {
                let allow = matches!(
                    (req.role, req.resource),
                    (Finance, Financial) | (Warehouse, Material)
                );
                Decision::when(allow, Reason::ApprovalRestricted)
            }),
            Rule::DeleteRestricted => (req.action == Delete).then(|| {
                Decision::when(req.on_home_module(), Reason::DeleteRestricted)
            }),
            Rule::OperationalAccess => operational_access(req),
        }
    }

    /// 1-based position in `PIPELINE`.
    pub fn step(self) -> u8 {
        PIPELINE.iter().position(|r| *r == self).map_or(0, |i| i as u8 + 1)
    }
}

/// Create/read/edit under `operation`/`any` scope, after every restriction
/// above has had its say.
fn operational_access(req: &Request) -> Option<Decision> {
    if req.role.home_resource().is_some() {
        let decision = if req.on_home_module() {
            Decision::allow(Reason::HomeModule)
        } else if req.action == Action::Read {
            Decision::allow(Reason::CrossModuleRead)
        } else {
            Decision::deny(Reason::OperationRestricted)
        };
        return Some(decision);
    }

    if req.role == Role::Staff {
        if req.resource == Resource::Service
            && matches!(req.action, Action::Read | Action::Create | Action::Edit)
        {
            return Some(Decision::allow(Reason::StaffService));
        }
        if req.action == Action::Read {
            return Some(Decision::allow(Reason::CrossModuleRead));
        }
    }

    // STAFF writes outside SERVICE are left to provisioned grants.
    None
}

/// Run the fast path only.
pub fn fast_path(req: &Request) -> Option<(Rule, Decision)> {
    PIPELINE
        .iter()
        .find_map(|rule| rule.apply(req).map(|d| (*rule, d)))
}

/// Slow path: consult stored associations. Fails closed.
pub fn stored_grant(req: &Request, store: &dyn RolePermissionStore) -> Decision {
    match store.is_granted(req.role, &req.permission()) {
        Ok(true) => Decision::allow(Reason::StoredGrant),
        Ok(false) => Decision::deny(Reason::NoGrant),
        Err(err) => {
            tracing::error!(
                role = %req.role,
                action = %req.action,
                resource = %req.resource,
                scope = %req.scope,
                error = %err,
                "role-permission lookup failed; denying"
            );
            Decision::deny(Reason::StoreUnavailable)
        }
    }
}

/// Full evaluation: fast path, then the store.
pub fn evaluate(req: &Request, store: &dyn RolePermissionStore) -> Decision {
    match fast_path(req) {
        Some((_, decision)) => decision,
        None => stored_grant(req, store),
    }
}

/// What a rule did during a traced evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Matched { decision: Decision },
    Skipped,
    NotReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RuleTrace {
    pub step: u8,
    /// `None` for the stored-grant lookup.
    pub rule: Option<Rule>,
    pub outcome: RuleOutcome,
}

/// Evaluate and record every step; the final decision equals `evaluate`.
pub fn trace(req: &Request, store: &dyn RolePermissionStore) -> (Vec<RuleTrace>, Decision) {
    let mut steps = Vec::with_capacity(PIPELINE.len() + 1);
    let mut decided: Option<Decision> = None;

    for rule in PIPELINE {
        let outcome = match decided {
            Some(_) => RuleOutcome::NotReached,
            None => match rule.apply(req) {
                Some(decision) => {
                    decided = Some(decision);
                    RuleOutcome::Matched { decision }
                }
                None => RuleOutcome::Skipped,
            },
        };
        steps.push(RuleTrace {
            step: rule.step(),
            rule: Some(rule),
            outcome,
        });
    }

    let (outcome, decision) = match decided {
        Some(decision) => (RuleOutcome::NotReached, decision),
        None => {
            let decision = stored_grant(req, store);
            (RuleOutcome::Matched { decision }, decision)
        }
    };
    steps.push(RuleTrace {
        step: PIPELINE.len() as u8 + 1,
        rule: None,
        outcome,
    });

    (steps, decision)
}

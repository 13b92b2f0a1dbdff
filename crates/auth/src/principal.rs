use std::borrow::Cow;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use nexus_core::{DomainError, UserId};

use crate::Role;

/// Whether a principal may currently act at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    #[default]
    Active,
    Inactive,
}

impl PrincipalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalStatus::Active => "active",
            PrincipalStatus::Inactive => "inactive",
        }
    }
}

impl core::fmt::Display for PrincipalStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(PrincipalStatus::Active),
            "inactive" | "suspended" => Ok(PrincipalStatus::Inactive),
            other => Err(DomainError::validation(format!("unknown principal status '{other}'"))),
        }
    }
}

/// A resolved principal as the engine sees it.
///
/// Single-role model: exactly one role per principal. `department` is
/// advisory and never consulted by the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default)]
    pub status: PrincipalStatus,
}

impl Principal {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            department: None,
            status: PrincipalStatus::Active,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_status(mut self, status: PrincipalStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }
}

/// Resolves which role(s) a principal acts with.
///
/// Call sites only see this seam, so moving from one role to a role set
/// does not touch them.
pub trait EffectiveRoles: Send + Sync {
    fn effective_roles<'a>(&self, principal: &'a Principal) -> Cow<'a, [Role]>;
}

/// The current policy: a principal acts with exactly its assigned role.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRole;

impl EffectiveRoles for SingleRole {
    fn effective_roles<'a>(&self, principal: &'a Principal) -> Cow<'a, [Role]> {
        Cow::Borrowed(std::slice::from_ref(&principal.role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_role_resolves_to_assigned_role() {
        let p = Principal::new(UserId::from_u128(1), Role::Finance);
        assert_eq!(SingleRole.effective_roles(&p).as_ref(), &[Role::Finance]);
    }

    #[test]
    fn status_parsing_accepts_legacy_suspended() {
        assert_eq!("Active".parse::<PrincipalStatus>().unwrap(), PrincipalStatus::Active);
        assert_eq!("suspended".parse::<PrincipalStatus>().unwrap(), PrincipalStatus::Inactive);
        assert!("deleted".parse::<PrincipalStatus>().is_err());
    }

    #[test]
    fn builder_sets_advisory_fields() {
        let p = Principal::new(UserId::from_u128(2), Role::Staff)
            .with_department("General Staff")
            .with_status(PrincipalStatus::Inactive);
        assert_eq!(p.department.as_deref(), Some("General Staff"));
        assert!(!p.is_active());
    }
}

use serde::{Deserialize, Serialize};

use crate::{Action, Resource, Scope};

/// A grantable permission: `(action, resource, scope)`.
///
/// The triple is the identity of a permission; the catalog never holds two
/// definitions for the same triple.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub resource: Resource,
    #[serde(default)]
    pub scope: Scope,
}

impl Permission {
    pub const fn new(action: Action, resource: Resource, scope: Scope) -> Self {
        Self {
            action,
            resource,
            scope,
        }
    }

    /// Whether this stored permission satisfies `requested`.
    pub fn satisfies(&self, requested: &Permission) -> bool {
        self.action == requested.action
            && self.resource == requested.resource
            && self.scope.covers(requested.scope)
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}:{}", self.resource, self.action, self.scope)
    }
}

/// Catalog entry for a permission (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    #[serde(flatten)]
    pub permission: Permission,
    pub display_name: String,
    pub description: String,
}

impl PermissionDefinition {
    /// Definition with the conventional display name and description,
    /// e.g. "Approve" / "Approve permission for financial".
    pub fn generated(permission: Permission) -> Self {
        let action = permission.action.as_str();
        let display_name = capitalize(&action.replace('_', " "));
        let mut description = format!(
            "{} permission for {}",
            capitalize(action),
            permission.resource.as_str().to_lowercase()
        );
        if permission.scope != Scope::Any {
            description.push_str(&format!(" ({} scope)", permission.scope));
        }

        Self {
            permission,
            display_name,
            description,
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

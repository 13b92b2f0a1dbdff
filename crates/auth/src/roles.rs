use serde::Serialize;

use crate::{Resource, Role};

/// Role metadata (for administration screens and seeding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDefinition {
    pub role: Role,
    pub display_name: String,
    pub description: String,
}

impl Role {
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Owner => "Owner",
            Role::Manager => "Manager",
            Role::Staff => "Staff",
            Role::Finance => "Finance",
            Role::Warehouse => "Warehouse",
            Role::Marketing => "Marketing",
            Role::Auditor => "Auditor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Owner => "Full system access",
            Role::Manager => "Department management access",
            Role::Staff => "General staff access",
            Role::Finance => "Financial module specialist",
            Role::Warehouse => "Material/inventory specialist",
            Role::Marketing => "Sales/marketing specialist",
            Role::Auditor => "Read-only access",
        }
    }

    /// The module a specialist role owns, if any.
    pub fn home_resource(&self) -> Option<Resource> {
        match self {
            Role::Finance => Some(Resource::Financial),
            Role::Warehouse => Some(Resource::Material),
            Role::Marketing => Some(Resource::Sales),
            _ => None,
        }
    }

    pub fn definition(&self) -> RoleDefinition {
        RoleDefinition {
            role: *self,
            display_name: self.display_name().to_string(),
            description: self.description().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_specialists_have_a_home_module() {
        let homed: Vec<_> = Role::ALL
            .iter()
            .filter_map(|r| r.home_resource().map(|m| (*r, m)))
            .collect();
        assert_eq!(
            homed,
            vec![
                (Role::Finance, Resource::Financial),
                (Role::Warehouse, Resource::Material),
                (Role::Marketing, Resource::Sales),
            ]
        );
    }
}

//! Bootstrap data: built-in roles, the permission catalog, default
//! associations and one demo principal per role.

use nexus_core::UserId;

use crate::{
    Action, DirectoryEntry, InMemoryDirectory, Permission, PermissionDefinition,
    PermissionSnapshot, Principal, Resource, Role, RoleDefinition, Scope,
};

pub fn role_definitions() -> Vec<RoleDefinition> {
    Role::ALL.iter().map(|r| r.definition()).collect()
}

/// Every action × resource at scope `any`.
pub fn permission_catalog() -> Vec<PermissionDefinition> {
    Resource::ALL
        .iter()
        .flat_map(|resource| {
            Action::ALL.iter().map(move |action| {
                PermissionDefinition::generated(Permission::new(*action, *resource, Scope::Any))
            })
        })
        .collect()
}

/// Default associations provisioned at bootstrap.
///
/// OWNER holds the whole catalog, AUDITOR every `read`, and each specialist
/// everything on its home module.
pub fn default_grants() -> Vec<(Role, Permission)> {
    permission_catalog()
        .into_iter()
        .map(|d| d.permission)
        .flat_map(|p| {
            let mut holders = vec![Role::Owner];
            if p.action == Action::Read {
                holders.push(Role::Auditor);
            }
            holders.extend(
                Role::ALL
                    .iter()
                    .copied()
                    .filter(|r| r.home_resource() == Some(p.resource)),
            );
            holders.into_iter().map(move |r| (r, p))
        })
        .collect()
}

pub fn bootstrap_snapshot() -> PermissionSnapshot {
    let mut snapshot = PermissionSnapshot::new();
    for def in permission_catalog() {
        snapshot.define(def);
    }
    for (role, permission) in default_grants() {
        snapshot.grant(role, permission);
    }
    snapshot
}

/// Deterministic id of the demo principal for `role`.
pub const fn demo_user_id(role: Role) -> UserId {
    UserId::from_u128(0x0190_0000_0000_7000_8000_0000_0000_0001 + role as u128)
}

pub fn demo_principals() -> Vec<DirectoryEntry> {
    let people = [
        (Role::Owner, "Alexandra Hamilton", "owner@nexus.com", "Board of Directors"),
        (Role::Manager, "Budi Santoso", "manager@nexus.com", "Operations"),
        (Role::Staff, "Sarah Jenkins", "staff@nexus.com", "General Staff"),
        (Role::Finance, "Dimas Finance", "finance@nexus.com", "Accounting & Tax"),
        (Role::Warehouse, "Wawan Gudang", "warehouse@nexus.com", "Logistics & Inventory"),
        (Role::Marketing, "Maya Marketing", "marketing@nexus.com", "Sales & Growth"),
        (Role::Auditor, "Robert Audit", "auditor@nexus.com", "Internal Audit"),
    ];

    people
        .into_iter()
        .map(|(role, name, email, department)| DirectoryEntry {
            principal: Principal::new(demo_user_id(role), role).with_department(department),
            display_name: name.to_string(),
            email: email.to_string(),
        })
        .collect()
}

pub fn demo_directory() -> InMemoryDirectory {
    InMemoryDirectory::from_entries(demo_principals())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrincipalDirectory;

    #[test]
    fn catalog_covers_every_action_and_resource_once() {
        let catalog = permission_catalog();
        assert_eq!(catalog.len(), Action::COUNT * Resource::COUNT);
        let unique: std::collections::BTreeSet<_> = catalog.iter().map(|d| d.permission).collect();
        assert_eq!(unique.len(), catalog.len());
        assert!(catalog.iter().all(|d| d.permission.scope == Scope::Any));
    }

    #[test]
    fn default_grants_follow_role_intent() {
        let snap = bootstrap_snapshot();
        assert_eq!(snap.permissions(Role::Owner).len(), 35);
        assert_eq!(snap.permissions(Role::Auditor).len(), 5);
        assert_eq!(snap.permissions(Role::Finance).len(), 7);
        assert!(snap
            .permissions(Role::Warehouse)
            .iter()
            .all(|p| p.resource == Resource::Material));
        assert!(snap.permissions(Role::Staff).is_empty());
        assert!(snap.permissions(Role::Manager).is_empty());
    }

    #[test]
    fn one_demo_principal_per_role() {
        let dir = demo_directory();
        for role in Role::ALL {
            let p = dir.resolve(&demo_user_id(*role)).unwrap();
            assert_eq!(p.role, *role);
            assert!(p.is_active());
        }
        assert_eq!(dir.list().len(), Role::COUNT);
    }

    #[test]
    fn role_definitions_carry_display_metadata() {
        let defs = role_definitions();
        assert_eq!(defs.len(), 7);
        assert_eq!(defs[0].display_name, "Owner");
        assert_eq!(defs[6].description, "Read-only access");
    }
}

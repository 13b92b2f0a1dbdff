//! Role → permission associations (the slow-path lookup table).
//!
//! Reads go through an immutable `PermissionSnapshot`; writes clone the
//! current snapshot, mutate the copy and swap it in atomically. Readers
//! therefore never wait on administration writes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::{Permission, PermissionDefinition, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("role-permission store unavailable: {0}")]
    Unavailable(String),
}

/// Immutable view of the catalog and the role associations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSnapshot {
    definitions: BTreeMap<Permission, PermissionDefinition>,
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl PermissionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the catalog entry for a permission.
    pub fn define(&mut self, definition: PermissionDefinition) {
        self.definitions.insert(definition.permission, definition);
    }

    /// Associate `permission` with `role`. Returns `true` if the association is new.
    pub fn grant(&mut self, role: Role, permission: Permission) -> bool {
        self.definitions
            .entry(permission)
            .or_insert_with(|| PermissionDefinition::generated(permission));
        self.grants.entry(role).or_default().insert(permission)
    }

    /// Returns `true` if an association was removed.
    pub fn revoke(&mut self, role: Role, permission: Permission) -> bool {
        match self.grants.get_mut(&role) {
            Some(set) => set.remove(&permission),
            None => false,
        }
    }

    pub fn permissions(&self, role: Role) -> BTreeSet<Permission> {
        self.grants.get(&role).cloned().unwrap_or_default()
    }

    /// Whether any permission held by `role` satisfies `requested`.
    pub fn is_granted(&self, role: Role, requested: &Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|set| set.iter().any(|p| p.satisfies(requested)))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PermissionDefinition> {
        self.definitions.values()
    }
}

/// Persisted many-to-many mapping of roles to permissions.
///
/// `grant`/`revoke` are idempotent and report whether anything changed.
pub trait RolePermissionStore: Send + Sync {
    fn permissions(&self, role: Role) -> Result<BTreeSet<Permission>, StoreError>;
    fn is_granted(&self, role: Role, requested: &Permission) -> Result<bool, StoreError>;
    fn grant(&self, role: Role, permission: Permission) -> Result<bool, StoreError>;
    fn revoke(&self, role: Role, permission: Permission) -> Result<bool, StoreError>;
    fn definitions(&self) -> Result<Vec<PermissionDefinition>, StoreError>;
}

impl<S> RolePermissionStore for Arc<S>
where
    S: RolePermissionStore + ?Sized,
{
    fn permissions(&self, role: Role) -> Result<BTreeSet<Permission>, StoreError> {
        (**self).permissions(role)
    }

    fn is_granted(&self, role: Role, requested: &Permission) -> Result<bool, StoreError> {
        (**self).is_granted(role, requested)
    }

    fn grant(&self, role: Role, permission: Permission) -> Result<bool, StoreError> {
        (**self).grant(role, permission)
    }

    fn revoke(&self, role: Role, permission: Permission) -> Result<bool, StoreError> {
        (**self).revoke(role, permission)
    }

    fn definitions(&self) -> Result<Vec<PermissionDefinition>, StoreError> {
        (**self).definitions()
    }
}

/// In-process store serving reads from an atomically swapped snapshot.
///
/// An `unloaded()` store answers every call with `StoreError::Unavailable`
/// until `replace` installs a snapshot (e.g. once Postgres has been read).
#[derive(Debug)]
pub struct SnapshotPermissionStore {
    current: ArcSwapOption<PermissionSnapshot>,
    writer: Mutex<()>,
}

impl SnapshotPermissionStore {
    pub fn new(snapshot: PermissionSnapshot) -> Self {
        Self {
            current: ArcSwapOption::new(Some(Arc::new(snapshot))),
            writer: Mutex::new(()),
        }
    }

    pub fn unloaded() -> Self {
        Self {
            current: ArcSwapOption::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Install a complete snapshot, replacing whatever was loaded.
    pub fn replace(&self, snapshot: PermissionSnapshot) {
        let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.current.store(Some(Arc::new(snapshot)));
    }

    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    pub fn snapshot(&self) -> Result<Arc<PermissionSnapshot>, StoreError> {
        self.current
            .load_full()
            .ok_or_else(|| StoreError::Unavailable("snapshot not loaded".to_string()))
    }

    fn mutate<F>(&self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut PermissionSnapshot) -> bool,
    {
        let _guard = self
            .writer
            .lock()
            .map_err(|_| StoreError::Unavailable("writer lock poisoned".to_string()))?;

        let mut next = (*self.snapshot()?).clone();
        let changed = f(&mut next);
        if changed {
            self.current.store(Some(Arc::new(next)));
        }
        Ok(changed)
    }
}

impl Default for SnapshotPermissionStore {
    fn default() -> Self {
        Self::new(PermissionSnapshot::new())
    }
}

impl RolePermissionStore for SnapshotPermissionStore {
    fn permissions(&self, role: Role) -> Result<BTreeSet<Permission>, StoreError> {
        Ok(self.snapshot()?.permissions(role))
    }

    fn is_granted(&self, role: Role, requested: &Permission) -> Result<bool, StoreError> {
        Ok(self.snapshot()?.is_granted(role, requested))
    }

    fn grant(&self, role: Role, permission: Permission) -> Result<bool, StoreError> {
        self.mutate(|s| s.grant(role, permission))
    }

    fn revoke(&self, role: Role, permission: Permission) -> Result<bool, StoreError> {
        self.mutate(|s| s.revoke(role, permission))
    }

    fn definitions(&self) -> Result<Vec<PermissionDefinition>, StoreError> {
        Ok(self.snapshot()?.definitions().cloned().collect())
    }
}

//! Principal directory: user reference → role, department, status.
//!
//! The system of record lives elsewhere; the engine only reads from it.
//! `InMemoryDirectory` is the in-process copy the request path resolves
//! against, so authorization never waits on a database round trip.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

use nexus_core::UserId;

use crate::{Principal, PrincipalStatus, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("principal {0} not found")]
    NotFound(UserId),

    #[error("principal directory unavailable: {0}")]
    Unavailable(String),
}

pub trait PrincipalDirectory: Send + Sync {
    fn resolve(&self, user_id: &UserId) -> Result<Principal, DirectoryError>;
}

impl<D> PrincipalDirectory for Arc<D>
where
    D: PrincipalDirectory + ?Sized,
{
    fn resolve(&self, user_id: &UserId) -> Result<Principal, DirectoryError> {
        (**self).resolve(user_id)
    }
}

/// Directory record: the principal plus the display fields admin screens show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub principal: Principal,
    pub display_name: String,
    pub email: String,
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<HashMap<UserId, DirectoryEntry>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        let map = entries
            .into_iter()
            .map(|e| (e.principal.user_id, e))
            .collect();
        Self {
            inner: RwLock::new(map),
        }
    }

    fn poisoned() -> DirectoryError {
        DirectoryError::Unavailable("lock poisoned".to_string())
    }

    /// Insert or replace one entry.
    pub fn upsert(&self, entry: DirectoryEntry) -> Result<(), DirectoryError> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        map.insert(entry.principal.user_id, entry);
        Ok(())
    }

    /// Replace the whole directory (reload from the system of record).
    pub fn replace_all(
        &self,
        entries: impl IntoIterator<Item = DirectoryEntry>,
    ) -> Result<(), DirectoryError> {
        let fresh: HashMap<_, _> = entries
            .into_iter()
            .map(|e| (e.principal.user_id, e))
            .collect();
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        *map = fresh;
        Ok(())
    }

    pub fn get(&self, user_id: &UserId) -> Option<DirectoryEntry> {
        let map = self.inner.read().ok()?;
        map.get(user_id).cloned()
    }

    /// All entries, ordered by email.
    pub fn list(&self) -> Vec<DirectoryEntry> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };
        let mut out: Vec<_> = map.values().cloned().collect();
        out.sort_by(|a, b| a.email.cmp(&b.email));
        out
    }

    /// Change the single role held by a principal.
    pub fn assign_role(&self, user_id: &UserId, role: Role) -> Result<Principal, DirectoryError> {
        self.update(user_id, |p| p.role = role)
    }

    pub fn set_status(
        &self,
        user_id: &UserId,
        status: PrincipalStatus,
    ) -> Result<Principal, DirectoryError> {
        self.update(user_id, |p| p.status = status)
    }

    fn update<F>(&self, user_id: &UserId, f: F) -> Result<Principal, DirectoryError>
    where
        F: FnOnce(&mut Principal),
    {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let entry = map
            .get_mut(user_id)
            .ok_or(DirectoryError::NotFound(*user_id))?;
        f(&mut entry.principal);
        Ok(entry.principal.clone())
    }
}

impl PrincipalDirectory for InMemoryDirectory {
    fn resolve(&self, user_id: &UserId) -> Result<Principal, DirectoryError> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        map.get(user_id)
            .map(|e| e.principal.clone())
            .ok_or(DirectoryError::NotFound(*user_id))
    }
}

//! Write-through seams used by administration flows.

use async_trait::async_trait;

use nexus_auth::{Permission, PrincipalStatus, Role};
use nexus_core::UserId;

use crate::RepositoryError;

/// Durable side of `Grant`/`Revoke`. Returns whether a row changed.
#[async_trait]
pub trait PermissionWriter: Send + Sync {
    async fn grant(&self, role: Role, permission: Permission) -> Result<bool, RepositoryError>;
    async fn revoke(&self, role: Role, permission: Permission) -> Result<bool, RepositoryError>;
}

/// Durable side of principal administration (role assignment, activation).
#[async_trait]
pub trait PrincipalWriter: Send + Sync {
    async fn assign_role(&self, user_id: UserId, role: Role) -> Result<(), RepositoryError>;
    async fn set_status(&self, user_id: UserId, status: PrincipalStatus) -> Result<(), RepositoryError>;
}

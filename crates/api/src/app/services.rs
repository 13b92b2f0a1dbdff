//! Service wiring: the in-memory authorization state and, when configured,
//! its durable Postgres counterpart.
//!
//! Administration writes go to Postgres first and are mirrored in memory
//! only after they committed, so the request path never observes a change
//! that could be lost on restart. One administration change runs at a time:
//! the durable write and its mirror happen under `admin`, so memory applies
//! changes in the order Postgres committed them.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tokio::sync::Mutex;

use nexus_auth::seed;
use nexus_auth::{
    AuthzError, Authorizer, DecisionCache, DirectoryEntry, DirectoryError, InMemoryDirectory,
    Permission, PermissionSnapshot, Principal, PrincipalStatus, Role, SnapshotPermissionStore,
};
use nexus_core::UserId;
use nexus_infra::{
    PermissionWriter, PostgresPermissionRepository, PostgresPrincipalRepository, PrincipalWriter,
    RepositoryError,
};

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct AppServices {
    authorizer: Authorizer,
    permissions: Arc<SnapshotPermissionStore>,
    directory: Arc<InMemoryDirectory>,
    permission_writer: Option<Arc<dyn PermissionWriter>>,
    principal_writer: Option<Arc<dyn PrincipalWriter>>,
    admin: Mutex<()>,
}

/// Build services from configuration: Postgres-backed when `DATABASE_URL`
/// is set, seeded in-memory state otherwise.
pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("no DATABASE_URL; using seeded in-memory state");
        return Ok(AppServices::in_memory(config));
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    nexus_infra::ensure_schema(&pool).await?;
    nexus_infra::seed_catalog(&pool).await?;
    if config.seed_demo_principals {
        nexus_infra::seed_principals(&pool, &seed::demo_principals()).await?;
    }

    let pool = Arc::new(pool);
    let permissions = PostgresPermissionRepository::new(pool.clone());
    let principals = PostgresPrincipalRepository::new(pool);

    // Decisions fail closed with `StoreUnavailable` until the first load lands.
    let services = AppServices::assemble(
        config,
        SnapshotPermissionStore::unloaded(),
        InMemoryDirectory::new(),
    );

    let snapshot = permissions.load_snapshot().await?;
    let entries = principals.load_all().await?;
    services.reload(snapshot, entries).await?;

    Ok(services
        .with_permission_writer(Arc::new(permissions))
        .with_principal_writer(Arc::new(principals)))
}

impl AppServices {
    /// Seeded catalog and grants; demo principals when enabled.
    pub fn in_memory(config: &ApiConfig) -> Self {
        let directory = if config.seed_demo_principals {
            seed::demo_directory()
        } else {
            InMemoryDirectory::new()
        };
        Self::assemble(
            config,
            SnapshotPermissionStore::new(seed::bootstrap_snapshot()),
            directory,
        )
    }

    fn assemble(
        config: &ApiConfig,
        store: SnapshotPermissionStore,
        directory: InMemoryDirectory,
    ) -> Self {
        let permissions = Arc::new(store);
        let directory = Arc::new(directory);
        let mut authorizer = Authorizer::new(directory.clone(), permissions.clone());
        if config.decision_cache {
            authorizer = authorizer.with_cache(DecisionCache::new(config.decision_cache_ttl));
        }

        let warmed = if permissions.is_loaded() {
            authorizer.warm_cache()
        } else {
            0
        };
        tracing::info!(
            cache = config.decision_cache,
            ttl_secs = authorizer.cache().map(|c| c.ttl().as_secs()),
            loaded = permissions.is_loaded(),
            warmed,
            "authorizer ready"
        );

        Self {
            authorizer,
            permissions,
            directory,
            permission_writer: None,
            principal_writer: None,
            admin: Mutex::new(()),
        }
    }

    /// Mirror permission changes into `writer` before applying them in memory.
    pub fn with_permission_writer(mut self, writer: Arc<dyn PermissionWriter>) -> Self {
        self.permission_writer = Some(writer);
        self
    }

    /// Mirror principal changes into `writer` before applying them in memory.
    pub fn with_principal_writer(mut self, writer: Arc<dyn PrincipalWriter>) -> Self {
        self.principal_writer = Some(writer);
        self
    }

    /// Install freshly loaded permissions and principals, then re-warm the cache.
    pub async fn reload(
        &self,
        snapshot: PermissionSnapshot,
        entries: Vec<DirectoryEntry>,
    ) -> Result<(), AdminError> {
        let _admin = self.admin.lock().await;
        let principals = entries.len();

        self.directory.replace_all(entries)?;
        self.permissions.replace(snapshot);
        self.authorizer.invalidate_all();
        let warmed = self.authorizer.warm_cache();

        tracing::info!(principals, warmed, "authorization state loaded");
        Ok(())
    }

    /// Whether the permission store has a snapshot to decide from.
    pub fn is_ready(&self) -> bool {
        self.permissions.is_loaded()
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn directory(&self) -> Arc<InMemoryDirectory> {
        self.directory.clone()
    }

    pub fn users(&self) -> Vec<DirectoryEntry> {
        self.directory.list()
    }

    pub fn user(&self, user_id: &UserId) -> Option<DirectoryEntry> {
        self.directory.get(user_id)
    }

    #[tracing::instrument(name = "admin", skip_all, fields(actor = %actor))]
    pub async fn grant(
        &self,
        actor: UserId,
        role: Role,
        permission: Permission,
    ) -> Result<bool, AdminError> {
        let _admin = self.admin.lock().await;
        let durable = match &self.permission_writer {
            Some(writer) => Some(writer.grant(role, permission).await?),
            None => None,
        };
        let changed = self
            .authorizer
            .grant(role, permission.action, permission.resource, permission.scope)?;
        Ok(durable.unwrap_or(changed))
    }

    #[tracing::instrument(name = "admin", skip_all, fields(actor = %actor))]
    pub async fn revoke(
        &self,
        actor: UserId,
        role: Role,
        permission: Permission,
    ) -> Result<bool, AdminError> {
        let _admin = self.admin.lock().await;
        let durable = match &self.permission_writer {
            Some(writer) => Some(writer.revoke(role, permission).await?),
            None => None,
        };
        let changed = self
            .authorizer
            .revoke(role, permission.action, permission.resource, permission.scope)?;
        Ok(durable.unwrap_or(changed))
    }

    /// Replace the single role held by `user_id`. Decisions for the user
    /// change on their next request; cached decisions are keyed by role and
    /// stay valid.
    #[tracing::instrument(name = "admin", skip_all, fields(actor = %actor))]
    pub async fn assign_role(
        &self,
        actor: UserId,
        user_id: UserId,
        role: Role,
    ) -> Result<Principal, AdminError> {
        let _admin = self.admin.lock().await;
        if self.directory.get(&user_id).is_none() {
            return Err(DirectoryError::NotFound(user_id).into());
        }
        if let Some(writer) = &self.principal_writer {
            writer.assign_role(user_id, role).await?;
        }
        let principal = self.directory.assign_role(&user_id, role)?;
        tracing::info!(actor = %actor, user_id = %user_id, role = %role, "role assigned");
        Ok(principal)
    }

    /// Activate or deactivate a principal. Inactive principals are denied
    /// everything from their next request on.
    #[tracing::instrument(name = "admin", skip_all, fields(actor = %actor))]
    pub async fn set_status(
        &self,
        actor: UserId,
        user_id: UserId,
        status: PrincipalStatus,
    ) -> Result<Principal, AdminError> {
        let _admin = self.admin.lock().await;
        if self.directory.get(&user_id).is_none() {
            return Err(DirectoryError::NotFound(user_id).into());
        }
        if let Some(writer) = &self.principal_writer {
            writer.set_status(user_id, status).await?;
        }
        let principal = self.directory.set_status(&user_id, status)?;
        tracing::info!(
            actor = %actor,
            user_id = %user_id,
            status = %status,
            "principal status changed"
        );
        Ok(principal)
    }
}

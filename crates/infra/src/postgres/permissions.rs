use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use nexus_auth::{Permission, PermissionDefinition, PermissionSnapshot, Role};

use super::parse_column;
use crate::RepositoryError;
use crate::error::map_sqlx_error;
use crate::writer::PermissionWriter;

/// Role-permission associations and the permission catalog in Postgres.
#[derive(Debug, Clone)]
pub struct PostgresPermissionRepository {
    pool: Arc<PgPool>,
}

impl PostgresPermissionRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Read the whole catalog and every grant into a snapshot.
    ///
    /// Rows naming values outside the closed enumerations (e.g. a legacy
    /// resource) are skipped with a warning rather than failing the load.
    #[instrument(skip(self), fields(definitions, grants), err)]
    pub async fn load_snapshot(&self) -> Result<PermissionSnapshot, RepositoryError> {
        let mut snapshot = PermissionSnapshot::new();

        let rows = sqlx::query(
            r#"
            SELECT action, resource, scope, display_name, description
            FROM permissions
            ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_snapshot", e))?;

        let mut definitions = 0usize;
        for row in rows {
            let action: String = row.try_get("action").map_err(|e| map_sqlx_error("load_snapshot", e))?;
            let resource: String = row.try_get("resource").map_err(|e| map_sqlx_error("load_snapshot", e))?;
            let scope: String = row.try_get("scope").map_err(|e| map_sqlx_error("load_snapshot", e))?;

            let permission = match parse_permission(&action, &resource, &scope) {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping permission row");
                    continue;
                }
            };

            snapshot.define(PermissionDefinition {
                permission,
                display_name: row.try_get("display_name").map_err(|e| map_sqlx_error("load_snapshot", e))?,
                description: row.try_get("description").map_err(|e| map_sqlx_error("load_snapshot", e))?,
            });
            definitions += 1;
        }

        let rows = sqlx::query(
            r#"
            SELECT r.name AS role, p.action, p.resource, p.scope
            FROM role_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_snapshot", e))?;

        let mut grants = 0usize;
        for row in rows {
            let role: String = row.try_get("role").map_err(|e| map_sqlx_error("load_snapshot", e))?;
            let action: String = row.try_get("action").map_err(|e| map_sqlx_error("load_snapshot", e))?;
            let resource: String = row.try_get("resource").map_err(|e| map_sqlx_error("load_snapshot", e))?;
            let scope: String = row.try_get("scope").map_err(|e| map_sqlx_error("load_snapshot", e))?;

            let parsed = parse_column::<Role>("role", &role)
                .and_then(|role| parse_permission(&action, &resource, &scope).map(|p| (role, p)));
            match parsed {
                Ok((role, permission)) => {
                    snapshot.grant(role, permission);
                    grants += 1;
                }
                Err(err) => tracing::warn!(error = %err, "skipping grant row"),
            }
        }

        Span::current().record("definitions", definitions);
        Span::current().record("grants", grants);
        Ok(snapshot)
    }
}

fn parse_permission(action: &str, resource: &str, scope: &str) -> Result<Permission, RepositoryError> {
    Ok(Permission::new(
        parse_column("action", action)?,
        parse_column("resource", resource)?,
        parse_column("scope", scope)?,
    ))
}

#[async_trait]
impl PermissionWriter for PostgresPermissionRepository {
    /// Registers the permission in the catalog if needed, then associates it.
    #[instrument(skip(self), fields(role = %role, permission = %permission), err)]
    async fn grant(&self, role: Role, permission: Permission) -> Result<bool, RepositoryError> {
        let definition = PermissionDefinition::generated(permission);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("grant", e))?;

        sqlx::query(
            r#"
            INSERT INTO permissions (action, resource, scope, display_name, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (action, resource, scope) DO NOTHING
            "#,
        )
        .bind(permission.action.as_str())
        .bind(permission.resource.as_str())
        .bind(permission.scope.as_str())
        .bind(&definition.display_name)
        .bind(&definition.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("grant", e))?;

        let role_exists: bool = sqlx::query("SELECT EXISTS (SELECT 1 FROM roles WHERE name = $1) AS present")
            .bind(role.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("grant", e))?
            .try_get("present")
            .map_err(|e| map_sqlx_error("grant", e))?;
        if !role_exists {
            return Err(RepositoryError::NotFound(format!("role {role}")));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT r.id, p.id
            FROM roles r, permissions p
            WHERE r.name = $1 AND p.action = $2 AND p.resource = $3 AND p.scope = $4
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role.as_str())
        .bind(permission.action.as_str())
        .bind(permission.resource.as_str())
        .bind(permission.scope.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("grant", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("grant", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(role = %role, permission = %permission), err)]
    async fn revoke(&self, role: Role, permission: Permission) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM role_permissions rp
            USING roles r, permissions p
            WHERE rp.role_id = r.id
              AND rp.permission_id = p.id
              AND r.name = $1 AND p.action = $2 AND p.resource = $3 AND p.scope = $4
            "#,
        )
        .bind(role.as_str())
        .bind(permission.action.as_str())
        .bind(permission.resource.as_str())
        .bind(permission.scope.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("revoke", e))?;

        Ok(result.rows_affected() > 0)
    }
}

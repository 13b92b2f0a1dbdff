use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};
use uuid::Uuid;

use nexus_auth::{DirectoryEntry, Principal, PrincipalStatus, Role};
use nexus_core::UserId;

use super::parse_column;
use crate::RepositoryError;
use crate::error::map_sqlx_error;
use crate::writer::PrincipalWriter;

/// Users and their single role assignment.
#[derive(Debug, Clone)]
pub struct PostgresPrincipalRepository {
    pool: Arc<PgPool>,
}

impl PostgresPrincipalRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Every user holding a role. Users without a role row cannot be
    /// principals and are not returned.
    #[instrument(skip(self), fields(count), err)]
    pub async fn load_all(&self) -> Result<Vec<DirectoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.name, u.email, u.department, u.status, r.name AS role
            FROM users u
            JOIN user_roles ur ON ur.user_id = u.id
            JOIN roles r ON r.id = ur.role_id
            ORDER BY u.email
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("load_all", e))?;
            let role: String = row.try_get("role").map_err(|e| map_sqlx_error("load_all", e))?;
            let status: String = row.try_get("status").map_err(|e| map_sqlx_error("load_all", e))?;

            let role = match parse_column::<Role>("role", &role) {
                Ok(role) => role,
                Err(err) => {
                    tracing::warn!(user_id = %id, error = %err, "skipping principal with unknown role");
                    continue;
                }
            };
            let status = parse_column::<PrincipalStatus>("status", &status).unwrap_or_else(|err| {
                tracing::warn!(user_id = %id, error = %err, "unreadable status; treating principal as inactive");
                PrincipalStatus::Inactive
            });

            let mut principal = Principal::new(UserId::from_uuid(id), role).with_status(status);
            principal.department = row.try_get("department").map_err(|e| map_sqlx_error("load_all", e))?;

            entries.push(DirectoryEntry {
                principal,
                display_name: row.try_get("name").map_err(|e| map_sqlx_error("load_all", e))?,
                email: row.try_get("email").map_err(|e| map_sqlx_error("load_all", e))?,
            });
        }

        Span::current().record("count", entries.len());
        Ok(entries)
    }
}

#[async_trait]
impl PrincipalWriter for PostgresPrincipalRepository {
    #[instrument(skip(self), fields(user_id = %user_id, role = %role), err)]
    async fn assign_role(&self, user_id: UserId, role: Role) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, r.id FROM roles r WHERE r.name = $2
            ON CONFLICT (user_id) DO UPDATE SET role_id = EXCLUDED.role_id
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(role.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;

        // Zero rows: the role itself is missing. A missing user surfaces as a
        // foreign key violation, mapped to NotFound.
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("role {role}")));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, status = %status), err)]
    async fn set_status(&self, user_id: UserId, status: PrincipalStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET status = $2 WHERE id = $1")
            .bind(*user_id.as_uuid())
            .bind(status.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_status", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

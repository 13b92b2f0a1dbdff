use sqlx::{PgPool, Row};
use tracing::instrument;

use nexus_auth::DirectoryEntry;
use nexus_auth::seed;

use crate::RepositoryError;
use crate::error::map_sqlx_error;

/// DDL, one statement per entry (prepared statements cannot batch).
pub(crate) const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id BIGSERIAL PRIMARY KEY,
        action TEXT NOT NULL,
        resource TEXT NOT NULL,
        scope TEXT NOT NULL DEFAULT 'any',
        display_name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (action, resource, scope)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id BIGINT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        department TEXT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles(id),
        UNIQUE (user_id)
    )
    "#,
];

/// Create the tables if they do not exist yet.
#[instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), RepositoryError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }
    Ok(())
}

/// Seed roles, the permission catalog and the default grants.
///
/// Only runs against an empty `roles` table: grants revoked by an
/// administrator must not come back on the next boot. Returns whether
/// seeding happened.
#[instrument(skip(pool), err)]
pub async fn seed_catalog(pool: &PgPool) -> Result<bool, RepositoryError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;

    let existing: i64 = sqlx::query("SELECT COUNT(*) AS n FROM roles")
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?
        .try_get("n")
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;

    if existing > 0 {
        tracing::debug!(existing, "roles already present; skipping catalog seed");
        return Ok(false);
    }

    for def in seed::role_definitions() {
        sqlx::query(
            r#"
            INSERT INTO roles (name, display_name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(def.role.as_str())
        .bind(&def.display_name)
        .bind(&def.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;
    }

    for def in seed::permission_catalog() {
        let p = def.permission;
        sqlx::query(
            r#"
            INSERT INTO permissions (action, resource, scope, display_name, description)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (action, resource, scope) DO NOTHING
            "#,
        )
        .bind(p.action.as_str())
        .bind(p.resource.as_str())
        .bind(p.scope.as_str())
        .bind(&def.display_name)
        .bind(&def.description)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;
    }

    let grants = seed::default_grants();
    for (role, p) in &grants {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT r.id, p.id
            FROM roles r, permissions p
            WHERE r.name = $1 AND p.action = $2 AND p.resource = $3 AND p.scope = $4
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role.as_str())
        .bind(p.action.as_str())
        .bind(p.resource.as_str())
        .bind(p.scope.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("seed_catalog", e))?;

    tracing::info!(grants = grants.len(), "permission catalog seeded");
    Ok(true)
}

/// Insert principals that are not present yet (matched by id or email).
/// Existing rows, including their role, are left untouched.
#[instrument(skip(pool, entries), err)]
pub async fn seed_principals(pool: &PgPool, entries: &[DirectoryEntry]) -> Result<usize, RepositoryError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("seed_principals", e))?;

    let mut inserted = 0usize;
    for entry in entries {
        let principal = &entry.principal;
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, department, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(*principal.user_id.as_uuid())
        .bind(&entry.display_name)
        .bind(&entry.email)
        .bind(principal.department.as_deref())
        .bind(principal.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_principals", e))?;

        if result.rows_affected() == 0 {
            continue;
        }
        inserted += 1;

        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            SELECT $1, r.id FROM roles r WHERE r.name = $2
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(*principal.user_id.as_uuid())
        .bind(principal.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("seed_principals", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("seed_principals", e))?;

    tracing::info!(inserted, "principals seeded");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_every_table() {
        let ddl = SCHEMA.join("\n");
        for table in ["roles", "permissions", "role_permissions", "users", "user_roles"] {
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing table {table}"
            );
        }
    }

    #[test]
    fn one_role_per_user_is_enforced_by_the_schema() {
        let user_roles = SCHEMA
            .iter()
            .find(|s| s.contains("CREATE TABLE IF NOT EXISTS user_roles"))
            .unwrap();
        assert!(user_roles.contains("UNIQUE (user_id)"));
    }
}

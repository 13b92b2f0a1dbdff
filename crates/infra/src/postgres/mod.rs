//! Postgres-backed persistence.
//!
//! Queries are built at runtime (`sqlx::query`) so the crate compiles without
//! a live database; enum columns are stored as their wire strings.

mod permissions;
mod principals;
mod schema;

pub use permissions::PostgresPermissionRepository;
pub use principals::PostgresPrincipalRepository;
pub use schema::{ensure_schema, seed_catalog, seed_principals};

use std::str::FromStr;

use crate::RepositoryError;

/// Parse an enum column, reporting the offending value on failure.
pub(crate) fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, RepositoryError> {
    value
        .parse()
        .map_err(|_| RepositoryError::Corrupt(format!("{column} = {value:?}")))
}

//! Infrastructure layer: persistence of roles, permissions and principals.
//!
//! The request path never reaches this crate. Postgres is read at boot into
//! the in-memory store/directory, and administration writes go through here
//! first and are mirrored in memory only once committed.

pub mod error;
pub mod postgres;
pub mod writer;

pub use error::RepositoryError;
pub use postgres::{PostgresPermissionRepository, PostgresPrincipalRepository, ensure_schema, seed_catalog, seed_principals};
pub use writer::{PermissionWriter, PrincipalWriter};

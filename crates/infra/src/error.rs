use thiserror::Error;

/// Persistence failure.
///
/// Callers on the authorization side treat every variant except `NotFound`
/// as "store unavailable": retryable infrastructure, never a policy outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A row holds a value outside the closed enumerations.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Foreign key violation: the referenced user/role row is missing.
                Some("23503") => RepositoryError::NotFound(msg),
                _ => RepositoryError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            RepositoryError::NotFound(format!("row not found in {}", operation))
        }
        _ => RepositoryError::Database(format!("sqlx error in {}: {}", operation, err)),
    }
}

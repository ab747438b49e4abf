//! Error types for the PostgreSQL provider.

use sqlds_core::BuiltQuery;
use sqlds_storage::StorageError;
use sqlx_core::error::{Error as SqlxError, ErrorKind};

/// PostgreSQL error code for query_canceled (57014), raised by `statement_timeout`.
pub const PG_QUERY_CANCELED: &str = "57014";

/// Checks if a sqlx error has a specific PostgreSQL error code.
pub fn has_pg_error_code(err: &SqlxError, code: &str) -> bool {
    if let SqlxError::Database(db_err) = err {
        db_err.code().as_deref() == Some(code)
    } else {
        false
    }
}

/// Errors specific to the PostgreSQL provider.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StorageError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StorageError::connection_error(e.to_string()),
            PostgresError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

/// Maps a failed statement to a `StorageError` carrying the statement.
pub(crate) fn statement_error(err: SqlxError, query: &BuiltQuery) -> StorageError {
    match &err {
        SqlxError::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                StorageError::constraint_violation(db_err.message(), query)
            }
            _ if has_pg_error_code(&err, PG_QUERY_CANCELED) => {
                StorageError::execution(format!("statement timed out: {}", db_err.message()), query)
            }
            _ => StorageError::execution(db_err.message(), query),
        },
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            StorageError::connection_error(err.to_string())
        }
        _ => StorageError::execution(err.to_string(), query),
    }
}

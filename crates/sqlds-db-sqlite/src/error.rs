//! Error types for the SQLite provider.

use sqlds_core::BuiltQuery;
use sqlds_storage::StorageError;
use sqlx_core::error::{Error as SqlxError, ErrorKind};

/// Errors specific to the SQLite provider.
#[derive(Debug, thiserror::Error)]
pub enum SqliteError {
    /// Database open/connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl SqliteError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<SqliteError> for StorageError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Connection(e) => StorageError::connection_error(e.to_string()),
            SqliteError::Config { message } => {
                StorageError::internal(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Result type alias for SQLite operations.
pub type Result<T> = std::result::Result<T, SqliteError>;

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
            _ => StorageError::execution(db_err.message(), query),
        },
        SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_) => {
            StorageError::connection_error(err.to_string())
        }
        _ => StorageError::execution(err.to_string(), query),
    }
}

//! Storage error types.
//!
//! Statement failures carry the SQL text and the rendered parameters so a
//! failure Response can say exactly what was sent to the database.

use std::fmt;

use sqlds_core::BuiltQuery;

/// Errors that can occur while executing statements.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    /// The database rejected or failed a statement.
    #[error("{message} [sql: {sql}] [params: {params}]")]
    Execution {
        /// Driver message.
        message: String,
        /// Statement text as sent.
        sql: String,
        /// Rendered parameter list.
        params: String,
    },

    /// A unique, foreign-key, not-null or check constraint was violated.
    #[error("Constraint violation: {message} [sql: {sql}] [params: {params}]")]
    ConstraintViolation {
        /// Driver message.
        message: String,
        /// Statement text as sent.
        sql: String,
        /// Rendered parameter list.
        params: String,
    },

    /// A result column could not be decoded.
    #[error("Cannot decode column '{column}': {message}")]
    Decode {
        /// Column name as reported by the driver.
        column: String,
        /// Description of the failure.
        message: String,
    },

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {message}")]
    TransactionError {
        /// Description of the transaction error.
        message: String,
    },

    /// Failed to acquire a connection.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// No provider is configured for the requested database name.
    #[error("No database configured under name '{0}'")]
    UnknownDatabase(String),

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `Execution` error for `query`.
    #[must_use]
    pub fn execution(message: impl Into<String>, query: &BuiltQuery) -> Self {
        Self::Execution {
            message: message.into(),
            sql: query.sql.clone(),
            params: query.params_display(),
        }
    }

    /// Creates a new `ConstraintViolation` error for `query`.
    #[must_use]
    pub fn constraint_violation(message: impl Into<String>, query: &BuiltQuery) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
            sql: query.sql.clone(),
            params: query.params_display(),
        }
    }

    /// Creates a new `Decode` error.
    #[must_use]
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates a new `TransactionError` error.
    #[must_use]
    pub fn transaction_error(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a constraint violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::ConstraintViolation { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Execution { .. } => ErrorCategory::Execution,
            Self::ConstraintViolation { .. } => ErrorCategory::Constraint,
            Self::Decode { .. } => ErrorCategory::Internal,
            Self::TransactionError { .. } => ErrorCategory::Transaction,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::UnknownDatabase(_) => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Statement failed.
    Execution,
    /// Constraint violated.
    Constraint,
    /// Transaction-related error.
    Transaction,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Execution => write!(f, "execution"),
            Self::Constraint => write!(f, "constraint"),
            Self::Transaction => write!(f, "transaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

//! Engine error type.
//!
//! Every failure of a request is an [`EngineError`]. The engine converts it to
//! a failure [`Response`] in exactly one place.

use std::fmt;

use indexmap::IndexMap;
use sqlds_core::{Response, SchemaError};
use sqlds_query::QueryError;
use sqlds_storage::StorageError;

/// Errors that can occur while executing a request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// The DataSource definitions are inconsistent.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The request cannot be compiled.
    #[error("Invalid request: {0}")]
    Query(QueryError),

    /// The database failed a statement.
    #[error("Execution error: {0}")]
    Storage(#[from] StorageError),

    /// Field-level validation failed.
    #[error("Validation failed: {}", format_errors(.errors))]
    Validation {
        /// Message per field name.
        errors: IndexMap<String, String>,
    },

    /// An UPDATE matched no row.
    #[error("No rows updated in {data_source}")]
    NoRowsUpdated { data_source: String },

    /// A REMOVE matched no row.
    #[error("No rows removed from {data_source}")]
    NoRowsRemoved { data_source: String },

    /// The DataSource is not `sql` and no handler is registered for it.
    #[error("No handler registered for DataSource {0}")]
    NoHandler(String),

    /// The operation type is not one the engine executes.
    #[error("Unsupported operation '{operation}' on {data_source}")]
    UnsupportedOperation {
        data_source: String,
        operation: String,
    },

    /// A result value does not fit the field's declared type.
    #[error("Cannot map column for field '{field}': {message}")]
    RowMapping { field: String, message: String },
}

fn format_errors(errors: &IndexMap<String, String>) -> String {
    errors
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<QueryError> for EngineError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Schema(schema) => Self::Schema(schema),
            other => Self::Query(other),
        }
    }
}

impl EngineError {
    /// Creates a new `Validation` error for a single field.
    #[must_use]
    pub fn field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = IndexMap::new();
        errors.insert(field.into(), message.into());
        Self::Validation { errors }
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Schema(_) | Self::NoHandler(_) => ErrorCategory::Schema,
            Self::Query(_) | Self::Validation { .. } | Self::UnsupportedOperation { .. } => {
                ErrorCategory::Validation
            }
            Self::Storage(_)
            | Self::NoRowsUpdated { .. }
            | Self::NoRowsRemoved { .. }
            | Self::RowMapping { .. } => ErrorCategory::Execution,
        }
    }

    /// Response status code for this error.
    #[must_use]
    pub fn status(&self) -> i32 {
        match self {
            Self::Validation { .. } => sqlds_core::STATUS_VALIDATION_ERROR,
            _ => sqlds_core::STATUS_FAILURE,
        }
    }

    /// Converts the error into a failure response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Validation { errors } => Response::validation_failure(errors),
            other => Response::failure(other.to_string()),
        }
    }
}

/// Categories of engine errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Definition/integrity error.
    Schema,
    /// The request itself is invalid.
    Validation,
    /// Database execution failed or an expected row was missing.
    Execution,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Validation => write!(f, "validation"),
            Self::Execution => write!(f, "execution"),
        }
    }
}

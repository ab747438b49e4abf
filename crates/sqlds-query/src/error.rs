//! Request validation errors.

use sqlds_core::SchemaError;

/// Errors raised while compiling a request into SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Unknown filter field '{field}' on DataSource {data_source}")]
    UnknownFilterField { data_source: String, field: String },

    #[error("Unknown sort field '{field}' on DataSource {data_source}")]
    UnknownSortField { data_source: String, field: String },

    #[error("Unknown output field '{field}' on DataSource {data_source}")]
    UnknownOutputField { data_source: String, field: String },

    #[error("Unsupported criteria operator: {0}")]
    UnsupportedOperator(String),

    #[error("Malformed criteria: {0}")]
    MalformedCriteria(String),

    #[error("Invalid value for field '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Query too complex: {0}")]
    QueryTooComplex(String),
}

impl QueryError {
    #[must_use]
    pub fn unknown_filter_field(data_source: &str, field: &str) -> Self {
        Self::UnknownFilterField {
            data_source: data_source.to_string(),
            field: field.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_sort_field(data_source: &str, field: &str) -> Self {
        Self::UnknownSortField {
            data_source: data_source.to_string(),
            field: field.to_string(),
        }
    }

    #[must_use]
    pub fn unknown_output_field(data_source: &str, field: &str) -> Self {
        Self::UnknownOutputField {
            data_source: data_source.to_string(),
            field: field.to_string(),
        }
    }

    #[must_use]
    pub fn invalid_value(field: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Returns `true` for schema integrity problems rather than request problems.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema(_))
    }
}

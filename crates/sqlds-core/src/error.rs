//! Schema integrity errors.
//!
//! These indicate a bad DataSource definition rather than a bad request and
//! are never retried.

/// Errors raised while looking up or resolving schema elements.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// No DataSource is registered under the id.
    #[error("Unknown DataSource: {0}")]
    UnknownDataSource(String),

    /// The DataSource declares no field with this name.
    #[error("Unknown field '{field}' on DataSource {data_source}")]
    UnknownField {
        /// DataSource that was searched.
        data_source: String,
        /// Field name that was not found.
        field: String,
    },

    /// More than one field carries the same name.
    #[error("Ambiguous field '{field}' on DataSource {data_source}")]
    AmbiguousField {
        /// DataSource holding the duplicates.
        data_source: String,
        /// Duplicated field name.
        field: String,
    },

    /// A relation string is not of the form `DataSourceId.fieldName`.
    #[error("Malformed relation '{value}' on field {field}: expected DataSourceId.fieldName")]
    MalformedRelation {
        /// Field carrying the relation.
        field: String,
        /// The raw relation string.
        value: String,
    },

    /// No local foreign-key field exposes the include-from field as its display field.
    #[error("No source field on {data_source} for include-from field '{field}'")]
    NoSourceField {
        /// DataSource declaring the include-from field.
        data_source: String,
        /// Include-from field name.
        field: String,
    },

    /// Several local foreign keys target the same DataSource and nothing disambiguates.
    #[error(
        "Ambiguous foreign key for '{field}' on {data_source}: several fields reference {target}, set includeVia"
    )]
    AmbiguousForeignKey {
        /// DataSource declaring the include-from field.
        data_source: String,
        /// Include-from field name.
        field: String,
        /// Foreign DataSource referenced by the candidates.
        target: String,
    },

    /// An include-from chain exceeded the configured number of hops.
    #[error("Relation chain for '{field}' exceeds {max_depth} hops")]
    RelationChainTooDeep {
        /// Include-from field being resolved.
        field: String,
        /// Configured bound.
        max_depth: usize,
    },

    /// The operation needs a single-column primary key.
    #[error("Composite primary keys are not supported on {0}")]
    CompositeKeyUnsupported(String),

    /// The operation needs a primary key but none is declared.
    #[error("DataSource {0} declares no primary key")]
    MissingPrimaryKey(String),

    /// A DataSource id was registered twice.
    #[error("DataSource {0} is already registered")]
    DuplicateDataSource(String),

    /// A table or column name contains characters that cannot be quoted safely.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl SchemaError {
    /// Creates a new `UnknownField` error.
    #[must_use]
    pub fn unknown_field(data_source: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            data_source: data_source.into(),
            field: field.into(),
        }
    }

    /// Creates a new `MalformedRelation` error.
    #[must_use]
    pub fn malformed_relation(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedRelation {
            field: field.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SchemaError::unknown_field("EmployeeDS", "salary");
        assert_eq!(
            err.to_string(),
            "Unknown field 'salary' on DataSource EmployeeDS"
        );

        let err = SchemaError::malformed_relation("location_id", "LocationDS");
        assert!(err.to_string().contains("DataSourceId.fieldName"));
    }
}

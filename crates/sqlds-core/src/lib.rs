//! # sqlds-core
//!
//! Shared model for the sqlds DataSource-to-SQL adapter.
//!
//! This crate holds the pieces every other crate agrees on:
//!
//! - [`DataSource`] / [`Field`] / [`OperationBinding`]: the schema model
//! - [`DataSourceRegistry`]: id-keyed lookup of loaded schemas
//! - [`Request`] / [`Response`]: the per-call envelope crossing the boundary
//! - [`Criteria`]: the filter payload, decided at deserialization time
//! - [`SqlValue`] / [`FieldValue`]: bound parameters and typed result values
//! - [`BuiltQuery`]: a SQL string with its ordered parameters
//!
//! Schema objects are built once and treated as immutable afterwards; they
//! are shared across requests through `Arc`.

mod criteria;
mod datasource;
mod error;
mod field;
mod registry;
mod request;
mod response;
mod statement;
mod value;

pub use criteria::{Criteria, Criterion, TextMatchStyle};
pub use datasource::{DataSource, OperationBinding, OperationType, ServerType};
pub use error::SchemaError;
pub use field::{Field, FieldType};
pub use registry::DataSourceRegistry;
pub use request::Request;
pub use response::{
    Response, STATUS_FAILURE, STATUS_SUCCESS, STATUS_VALIDATION_ERROR,
};
pub use statement::BuiltQuery;
pub use value::{FieldValue, SqlValue};

/// Prefix marking client metadata keys (e.g. `_selection_1`) that never name a field.
pub const METADATA_PREFIX: char = '_';

/// Returns `true` when a payload key is client metadata rather than a field name.
#[must_use]
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}

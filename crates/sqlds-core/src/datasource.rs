//! DataSource definitions and per-operation bindings.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::field::Field;

/// Kind of CRUD operation a request performs.
///
/// Unrecognised operation names are kept in [`OperationType::Other`] so a
/// request carrying one still parses and can be answered with a failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationType {
    #[default]
    Fetch,
    Add,
    Update,
    Remove,
    Other(String),
}

impl OperationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fetch => "fetch",
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for OperationType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "fetch" => Self::Fetch,
            "add" => Self::Add,
            "update" => Self::Update,
            "remove" => Self::Remove,
            _ => Self::Other(value),
        }
    }
}

impl From<OperationType> for String {
    fn from(value: OperationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend serving a DataSource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    /// Served by the SQL engine.
    #[default]
    Sql,
    /// Served by an externally registered handler.
    Generic,
}

/// Per-operation SQL customization attached to a DataSource.
///
/// Clause overrides are templates; see the query assembler for the variables
/// they may reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationBinding {
    pub operation_type: OperationType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_clause: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansi_join_clause: Option<String>,

    /// Replaces the whole generated selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_sql: Option<String>,

    /// Criteria names consumed by template placeholders instead of generated filters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_criteria_fields: Vec<String>,
}

impl OperationBinding {
    pub fn new(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_table_clause(mut self, clause: impl Into<String>) -> Self {
        self.table_clause = Some(clause.into());
        self
    }

    #[must_use]
    pub fn with_where_clause(mut self, clause: impl Into<String>) -> Self {
        self.where_clause = Some(clause.into());
        self
    }

    #[must_use]
    pub fn with_ansi_join_clause(mut self, clause: impl Into<String>) -> Self {
        self.ansi_join_clause = Some(clause.into());
        self
    }

    #[must_use]
    pub fn with_custom_sql(mut self, sql: impl Into<String>) -> Self {
        self.custom_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn with_excluded_criteria(mut self, fields: &[&str]) -> Self {
        self.exclude_criteria_fields = fields.iter().map(|f| (*f).to_string()).collect();
        self
    }

    pub fn excludes(&self, field: &str) -> bool {
        self.exclude_criteria_fields.iter().any(|f| f == field)
    }
}

/// A named, schema-described table exposed for CRUD.
///
/// Equality and hashing use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,

    pub table_name: String,

    /// Database the connection provider routes this DataSource to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,

    #[serde(default)]
    pub server_type: ServerType,

    /// Ordered; defines the default output order.
    #[serde(default)]
    pub fields: Vec<Field>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operation_bindings: Vec<OperationBinding>,
}

impl DataSource {
    pub fn new(id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            table_name: table_name.into(),
            db_name: None,
            server_type: ServerType::Sql,
            fields: Vec::new(),
            operation_bindings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = Some(db_name.into());
        self
    }

    #[must_use]
    pub fn with_server_type(mut self, server_type: ServerType) -> Self {
        self.server_type = server_type;
        self
    }

    #[must_use]
    pub fn with_binding(mut self, binding: OperationBinding) -> Self {
        self.operation_bindings.push(binding);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_sql(&self) -> bool {
        self.server_type == ServerType::Sql
    }

    /// Looks up a field by exact name.
    ///
    /// # Errors
    ///
    /// `UnknownField` when absent, `AmbiguousField` when the name is declared twice.
    pub fn field(&self, name: &str) -> Result<&Field, SchemaError> {
        let mut matches = self.fields.iter().filter(|f| f.name == name);
        let found = matches
            .next()
            .ok_or_else(|| SchemaError::unknown_field(&self.id, name))?;
        if matches.next().is_some() {
            return Err(SchemaError::AmbiguousField {
                data_source: self.id.clone(),
                field: name.to_string(),
            });
        }
        Ok(found)
    }

    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_keys(&self) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.primary_key).collect()
    }

    /// The primary-key fields, failing when none is declared.
    pub fn require_primary_keys(&self) -> Result<Vec<&Field>, SchemaError> {
        let keys = self.primary_keys();
        if keys.is_empty() {
            return Err(SchemaError::MissingPrimaryKey(self.id.clone()));
        }
        Ok(keys)
    }

    /// The single primary-key field; composite keys are rejected.
    pub fn single_primary_key(&self) -> Result<&Field, SchemaError> {
        let keys = self.require_primary_keys()?;
        match keys.as_slice() {
            [key] => Ok(key),
            _ => Err(SchemaError::CompositeKeyUnsupported(self.id.clone())),
        }
    }

    /// Selects the binding for an operation.
    ///
    /// A binding whose operation id matches wins; otherwise a binding for the
    /// operation type without an id applies.
    pub fn binding_for(
        &self,
        operation_type: &OperationType,
        operation_id: Option<&str>,
    ) -> Option<&OperationBinding> {
        let candidates = || {
            self.operation_bindings
                .iter()
                .filter(move |b| &b.operation_type == operation_type)
        };

        if let Some(id) = operation_id
            && let Some(binding) = candidates().find(|b| b.operation_id.as_deref() == Some(id))
        {
            return Some(binding);
        }

        candidates().find(|b| b.operation_id.is_none())
    }
}

impl PartialEq for DataSource {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DataSource {}

impl Hash for DataSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    fn employee() -> DataSource {
        DataSource::new("EmployeeDS", "employee")
            .with_field(Field::new("id", FieldType::Sequence).with_primary_key())
            .with_field(Field::new("name", FieldType::Text))
            .with_field(Field::new("email", FieldType::Text))
    }

    #[test]
    fn test_field_lookup() {
        let ds = employee();
        assert_eq!(ds.field("email").unwrap().name, "email");
        assert!(matches!(
            ds.field("salary"),
            Err(SchemaError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_duplicate_field_is_ambiguous() {
        let ds = employee().with_field(Field::new("email", FieldType::Text));
        assert!(matches!(
            ds.field("email"),
            Err(SchemaError::AmbiguousField { .. })
        ));
    }

    #[test]
    fn test_primary_keys() {
        let ds = employee();
        assert_eq!(ds.single_primary_key().unwrap().name, "id");

        let composite = employee().with_field(Field::new("org", FieldType::Text).with_primary_key());
        assert!(matches!(
            composite.single_primary_key(),
            Err(SchemaError::CompositeKeyUnsupported(_))
        ));

        let keyless = DataSource::new("LogDS", "log");
        assert!(matches!(
            keyless.require_primary_keys(),
            Err(SchemaError::MissingPrimaryKey(_))
        ));
    }

    #[test]
    fn test_binding_selection() {
        let ds = employee()
            .with_binding(OperationBinding::new(OperationType::Fetch).with_where_clause("a"))
            .with_binding(
                OperationBinding::new(OperationType::Fetch)
                    .with_operation_id("byDept")
                    .with_where_clause("b"),
            );

        let default = ds.binding_for(&OperationType::Fetch, None).unwrap();
        assert_eq!(default.where_clause.as_deref(), Some("a"));

        let by_id = ds.binding_for(&OperationType::Fetch, Some("byDept")).unwrap();
        assert_eq!(by_id.where_clause.as_deref(), Some("b"));

        let fallback = ds.binding_for(&OperationType::Fetch, Some("other")).unwrap();
        assert_eq!(fallback.where_clause.as_deref(), Some("a"));

        assert!(ds.binding_for(&OperationType::Update, None).is_none());
    }

    #[test]
    fn test_operation_type_parsing() {
        let op: OperationType = serde_json::from_value(serde_json::json!("UPDATE")).unwrap();
        assert_eq!(op, OperationType::Update);

        let op: OperationType = serde_json::from_value(serde_json::json!("export")).unwrap();
        assert_eq!(op, OperationType::Other("export".into()));
        assert_eq!(op.to_string(), "export");
    }
}

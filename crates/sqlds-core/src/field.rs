//! Field definitions.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    #[serde(rename = "time")]
    Time,
    #[serde(rename = "enum")]
    Enum,
    #[serde(rename = "intEnum")]
    IntEnum,
    /// Database-generated integer key.
    #[serde(rename = "sequence")]
    Sequence,
    /// Relation to a record of another DataSource.
    #[serde(rename = "entity")]
    Entity,
}

impl FieldType {
    /// Types compared as character data.
    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Enum)
    }

    /// Types stored as whole numbers.
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Integer | Self::IntEnum | Self::Sequence)
    }
}

/// One attribute of a DataSource.
///
/// Equality and hashing use the name only, so a field can be used as a map
/// key independently of its other attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,

    /// Database column; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default = "default_can_edit")]
    pub can_edit: bool,

    /// Array-valued; for relations this marks the one-to-many side.
    #[serde(default)]
    pub multiple: bool,

    /// SQL expression selected instead of the column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_select_expression: Option<String>,

    /// `ForeignDataSourceId.fieldName`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,

    /// `ForeignDataSourceId.fieldName` imported through an existing foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_from: Option<String>,

    /// Local foreign-key field to traverse for `include_from`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_via: Option<String>,

    /// Local field that receives the value imported through this foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_field: Option<String>,

    /// Field on the foreign DataSource shown for this foreign key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_display_field: Option<String>,
}

fn default_can_edit() -> bool {
    true
}

impl Field {
    /// Creates a field with a declared type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_type: Some(field_type),
            ..Self::untyped(name)
        }
    }

    /// Creates a field without a declared type.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: None,
            field_type: None,
            primary_key: false,
            required: false,
            hidden: false,
            can_edit: true,
            multiple: false,
            custom_select_expression: None,
            foreign_key: None,
            include_from: None,
            include_via: None,
            display_field: None,
            foreign_display_field: None,
        }
    }

    #[must_use]
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    #[must_use]
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn with_required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    #[must_use]
    pub fn with_can_edit(mut self, can_edit: bool) -> Self {
        self.can_edit = can_edit;
        self
    }

    #[must_use]
    pub fn with_multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[must_use]
    pub fn with_custom_select(mut self, expression: impl Into<String>) -> Self {
        self.custom_select_expression = Some(expression.into());
        self
    }

    #[must_use]
    pub fn with_foreign_key(mut self, reference: impl Into<String>) -> Self {
        self.foreign_key = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_include_from(mut self, reference: impl Into<String>) -> Self {
        self.include_from = Some(reference.into());
        self
    }

    #[must_use]
    pub fn with_include_via(mut self, field: impl Into<String>) -> Self {
        self.include_via = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_display_field(mut self, field: impl Into<String>) -> Self {
        self.display_field = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_foreign_display_field(mut self, field: impl Into<String>) -> Self {
        self.foreign_display_field = Some(field.into());
        self
    }

    /// Database column name: the explicit column, else the field name.
    pub fn db_column(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    /// Declared type, `Text` when absent.
    pub fn kind(&self) -> FieldType {
        self.field_type.unwrap_or(FieldType::Text)
    }

    pub fn has_declared_type(&self) -> bool {
        self.field_type.is_some()
    }

    pub fn is_include_from(&self) -> bool {
        self.include_from.is_some()
    }

    /// Relations that cannot be flattened into the parent join and are
    /// resolved by a nested fetch per row.
    pub fn needs_sub_fetch(&self) -> bool {
        self.foreign_key.is_some()
            && (self.multiple || self.field_type == Some(FieldType::Entity))
    }

    /// Stored as a plain column of the DataSource's own table.
    ///
    /// A single-valued entity field stores its foreign key locally.
    pub fn is_local_column(&self) -> bool {
        !self.is_include_from()
            && !(self.needs_sub_fetch() && self.multiple)
            && self.custom_select_expression.is_none()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_db_column_defaults_to_name() {
        let field = Field::new("email", FieldType::Text);
        assert_eq!(field.db_column(), "email");

        let field = Field::new("email", FieldType::Text).with_column("email_address");
        assert_eq!(field.db_column(), "email_address");
    }

    #[test]
    fn test_equality_by_name_only() {
        let a = Field::new("id", FieldType::Integer).with_primary_key();
        let b = Field::new("id", FieldType::Text).with_column("ident");
        assert_eq!(a, b);

        let set: HashSet<Field> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_sub_fetch_detection() {
        let roles = Field::new("roles", FieldType::Entity)
            .with_foreign_key("EmployeeRoleDS.employee_id")
            .with_multiple();
        assert!(roles.needs_sub_fetch());
        assert!(!roles.is_local_column());

        let location_id = Field::new("location_id", FieldType::Integer)
            .with_foreign_key("LocationDS.id");
        assert!(!location_id.needs_sub_fetch());
        assert!(location_id.is_local_column());

        let manager = Field::new("manager", FieldType::Entity).with_foreign_key("EmployeeDS.id");
        assert!(manager.needs_sub_fetch());
        assert!(manager.is_local_column());

        let untyped = Field::untyped("tags")
            .with_foreign_key("TagDS.owner")
            .with_multiple();
        assert!(untyped.needs_sub_fetch());
        assert!(!untyped.has_declared_type());
        assert_eq!(untyped.kind(), FieldType::Text);
    }

    #[test]
    fn test_deserialize_wire_shape() {
        let field: Field = serde_json::from_value(serde_json::json!({
            "name": "country_name",
            "type": "text",
            "includeFrom": "LocationDS.country_name",
            "includeVia": "location_id"
        }))
        .unwrap();

        assert_eq!(field.kind(), FieldType::Text);
        assert_eq!(field.include_from.as_deref(), Some("LocationDS.country_name"));
        assert_eq!(field.include_via.as_deref(), Some("location_id"));
        assert!(field.can_edit);
    }
}

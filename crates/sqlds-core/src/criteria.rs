//! Filter payloads.
//!
//! A FETCH or REMOVE request carries either a flat `{field: value}` map or an
//! advanced criteria tree. Which one it is gets decided once, at
//! deserialization, by the presence of an `operator` key.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How string values in a flat criteria map are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMatchStyle {
    /// Equality; case sensitivity follows the column collation.
    Exact,
    /// Equality. Primary-key lookups always use this style.
    ExactCase,
    Substring,
    #[default]
    StartsWith,
}

/// One node of an advanced criteria tree.
///
/// Leaf nodes carry `field_name` plus `value` (or `start`/`end` for range
/// operators); `and`/`or`/`not` nodes carry child `criteria`. Unknown keys
/// such as `_constructor` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    pub operator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub criteria: Vec<Criterion>,
}

impl Criterion {
    /// Leaf node comparing a field to a value.
    pub fn leaf(operator: &str, field_name: &str, value: impl Into<Value>) -> Self {
        Self {
            operator: operator.to_string(),
            field_name: Some(field_name.to_string()),
            value: Some(value.into()),
            start: None,
            end: None,
            criteria: Vec::new(),
        }
    }

    /// Leaf node for operators that take no value (`isNull`, `notBlank`, ...).
    pub fn unary(operator: &str, field_name: &str) -> Self {
        Self {
            value: None,
            ..Self::leaf(operator, field_name, Value::Null)
        }
    }

    /// Range node using `start` and `end`.
    pub fn range(
        operator: &str,
        field_name: &str,
        start: impl Into<Value>,
        end: impl Into<Value>,
    ) -> Self {
        Self {
            value: None,
            start: Some(start.into()),
            end: Some(end.into()),
            ..Self::leaf(operator, field_name, Value::Null)
        }
    }

    /// Composite node (`and`, `or`, `not`).
    pub fn composite(operator: &str, criteria: Vec<Criterion>) -> Self {
        Self {
            operator: operator.to_string(),
            field_name: None,
            value: None,
            start: None,
            end: None,
            criteria,
        }
    }

    pub fn and(criteria: Vec<Criterion>) -> Self {
        Self::composite("and", criteria)
    }

    pub fn or(criteria: Vec<Criterion>) -> Self {
        Self::composite("or", criteria)
    }
}

/// Filter payload of a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Criteria {
    /// Advanced criteria tree. Listed first: an object with an `operator`
    /// key is always a tree.
    Tree(Criterion),
    /// Flat `{field: value}` equality map, in payload order.
    Map(IndexMap<String, Value>),
}

impl Criteria {
    pub fn empty() -> Self {
        Self::Map(IndexMap::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Map(map) => map.is_empty(),
            Self::Tree(_) => false,
        }
    }

    /// Top-level `field = value` pairs, used for `${criteria.<field>}` and
    /// for value payloads. Trees expose the direct leaves of a top-level
    /// `and` plus a bare leaf.
    pub fn value_of(&self, field: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(field),
            Self::Tree(node) => {
                let leaves: Box<dyn Iterator<Item = &Criterion>> =
                    if node.operator.eq_ignore_ascii_case("and") {
                        Box::new(node.criteria.iter())
                    } else {
                        Box::new(std::iter::once(node))
                    };
                leaves
                    .filter(|c| c.field_name.as_deref() == Some(field))
                    .find_map(|c| c.value.as_ref())
            }
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            Self::Tree(_) => None,
        }
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<IndexMap<String, Value>> for Criteria {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self::Map(map)
    }
}

impl From<Criterion> for Criteria {
    fn from(node: Criterion) -> Self {
        Self::Tree(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tree_detected_by_operator() {
        let criteria: Criteria = serde_json::from_value(json!({
            "_constructor": "AdvancedCriteria",
            "operator": "and",
            "criteria": [
                {"fieldName": "name", "operator": "iContains", "value": "ann"},
                {"fieldName": "email", "operator": "notNull"}
            ]
        }))
        .unwrap();

        let Criteria::Tree(root) = &criteria else {
            panic!("expected tree, got {criteria:?}");
        };
        assert_eq!(root.operator, "and");
        assert_eq!(root.criteria.len(), 2);
        assert_eq!(root.criteria[1].value, None);
        assert_eq!(criteria.value_of("name"), Some(&json!("ann")));
    }

    #[test]
    fn test_flat_map_keeps_order() {
        let criteria: Criteria =
            serde_json::from_value(json!({"b": 1, "a": "x", "_selection": true})).unwrap();
        let map = criteria.as_map().unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a", "_selection"]);
        assert_eq!(criteria.value_of("a"), Some(&json!("x")));
    }

    #[test]
    fn test_text_match_style_wire_names() {
        let style: TextMatchStyle = serde_json::from_value(json!("exactCase")).unwrap();
        assert_eq!(style, TextMatchStyle::ExactCase);
        assert_eq!(TextMatchStyle::default(), TextMatchStyle::StartsWith);
    }
}

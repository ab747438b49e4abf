//! Response envelope.

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::FieldValue;

pub const STATUS_SUCCESS: i32 = 0;
pub const STATUS_FAILURE: i32 = -1;
pub const STATUS_VALIDATION_ERROR: i32 = -4;

/// Result of one request.
///
/// Rows are positional: `data[r][i]` is the value of `fields[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: i32,
    pub start_row: u64,
    pub end_row: u64,
    pub total_rows: u64,
    pub fields: Vec<String>,
    pub data: Vec<Vec<FieldValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<IndexMap<String, String>>,
}

impl Response {
    /// Successful response; `end_row` follows from the row count.
    pub fn success(
        fields: Vec<String>,
        data: Vec<Vec<FieldValue>>,
        start_row: u64,
        total_rows: u64,
    ) -> Self {
        let end_row = start_row + data.len() as u64;
        Self {
            status: STATUS_SUCCESS,
            start_row,
            end_row,
            total_rows,
            fields,
            data,
            message: None,
            errors: None,
        }
    }

    pub fn empty(fields: Vec<String>) -> Self {
        Self::success(fields, Vec::new(), 0, 0)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_FAILURE,
            start_row: 0,
            end_row: 0,
            total_rows: 0,
            fields: Vec::new(),
            data: Vec::new(),
            message: Some(message.into()),
            errors: None,
        }
    }

    pub fn validation_failure(errors: IndexMap<String, String>) -> Self {
        Self {
            status: STATUS_VALIDATION_ERROR,
            errors: Some(errors),
            ..Self::failure("Validation failed")
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Value of `field` in row `row`.
    pub fn value(&self, row: usize, field: &str) -> Option<&FieldValue> {
        let idx = self.field_index(field)?;
        self.data.get(row)?.get(idx)
    }

    /// Row count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_positions() {
        let response = Response::success(
            vec!["id".into(), "name".into()],
            vec![
                vec![FieldValue::Integer(1), "Ann".into()],
                vec![FieldValue::Integer(2), "Bob".into()],
            ],
            2,
            10,
        );
        assert!(response.is_success());
        assert_eq!(response.end_row, 4);
        assert_eq!(response.value(1, "name"), Some(&FieldValue::from("Bob")));
        assert_eq!(response.value(0, "missing"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut errors = IndexMap::new();
        errors.insert("name".to_string(), "Field is required".to_string());
        let response = Response::validation_failure(errors);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], json!(-4));
        assert_eq!(json["errors"]["name"], json!("Field is required"));
        assert_eq!(json["totalRows"], json!(0));
    }
}

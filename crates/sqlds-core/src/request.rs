//! Request envelope.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::criteria::{Criteria, TextMatchStyle};
use crate::datasource::OperationType;

/// One CRUD call against a DataSource.
///
/// `data` holds criteria for FETCH/REMOVE and record values for ADD/UPDATE.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub operation_type: OperationType,

    pub data_source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Criteria>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_values: Option<IndexMap<String, Value>>,

    /// Comma-separated field names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,

    /// Comma-separated `localField!ForeignDsId.foreignFieldName` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_outputs: Option<String>,

    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sort_by: Vec<String>,

    #[serde(default)]
    pub start_row: u64,

    /// Exclusive; -1 means unbounded.
    #[serde(default = "unbounded")]
    pub end_row: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_match_style: Option<TextMatchStyle>,
}

fn unbounded() -> i64 {
    -1
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(OneOrMany::Many(v)) => v,
    })
}

impl Request {
    pub fn new(operation_type: OperationType, data_source: impl Into<String>) -> Self {
        Self {
            operation_type,
            data_source: data_source.into(),
            end_row: -1,
            ..Self::default()
        }
    }

    pub fn fetch(data_source: impl Into<String>) -> Self {
        Self::new(OperationType::Fetch, data_source)
    }

    pub fn add(data_source: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self::new(OperationType::Add, data_source).with_criteria(Criteria::Map(values))
    }

    pub fn update(data_source: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self::new(OperationType::Update, data_source).with_criteria(Criteria::Map(values))
    }

    pub fn remove(data_source: impl Into<String>, keys: IndexMap<String, Value>) -> Self {
        Self::new(OperationType::Remove, data_source).with_criteria(Criteria::Map(keys))
    }

    #[must_use]
    pub fn with_criteria(mut self, criteria: impl Into<Criteria>) -> Self {
        self.data = Some(criteria.into());
        self
    }

    #[must_use]
    pub fn with_old_values(mut self, old_values: IndexMap<String, Value>) -> Self {
        self.old_values = Some(old_values);
        self
    }

    #[must_use]
    pub fn with_outputs(mut self, outputs: &str) -> Self {
        self.outputs = Some(outputs.to_string());
        self
    }

    #[must_use]
    pub fn with_additional_outputs(mut self, additional: &str) -> Self {
        self.additional_outputs = Some(additional.to_string());
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort_by: &[&str]) -> Self {
        self.sort_by = sort_by.iter().map(|s| (*s).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_range(mut self, start_row: u64, end_row: i64) -> Self {
        self.start_row = start_row;
        self.end_row = end_row;
        self
    }

    #[must_use]
    pub fn with_operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_text_match_style(mut self, style: TextMatchStyle) -> Self {
        self.text_match_style = Some(style);
        self
    }

    /// Requested output names, trimmed, in order; `None` means all fields.
    pub fn output_names(&self) -> Option<Vec<String>> {
        self.outputs.as_deref().map(split_list).filter(|v| !v.is_empty())
    }

    pub fn additional_output_entries(&self) -> Vec<String> {
        self.additional_outputs
            .as_deref()
            .map(split_list)
            .unwrap_or_default()
    }

    /// Record values for ADD/UPDATE.
    pub fn values(&self) -> Option<&IndexMap<String, Value>> {
        self.data.as_ref().and_then(Criteria::as_map)
    }

    /// `endRow` when bounded.
    pub fn bounded_end(&self) -> Option<u64> {
        u64::try_from(self.end_row).ok()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

//! ADD, UPDATE and REMOVE.
//!
//! Each mutation runs its statement, the affected-row check and a
//! verification fetch on one transactional session. The transaction commits
//! only when all of them succeed.

use indexmap::IndexMap;
use serde_json::Value;
use sqlds_core::{
    BuiltQuery, Criteria, DataSource, Field, FieldType, FieldValue, Request, Response, SqlValue,
    TextMatchStyle, is_metadata_key,
};
use sqlds_query::MutationBuilder;
use sqlds_storage::StorageError;
use tracing::debug;

use crate::engine::{Session, SqlDataSourceEngine, finish};
use crate::error::EngineError;

const REQUIRED_MESSAGE: &str = "Field is required";

type Assignments<'a> = Vec<(&'a Field, SqlValue)>;

impl SqlDataSourceEngine {
    pub(crate) async fn add(
        &self,
        data_source: &DataSource,
        request: &Request,
        depth: usize,
    ) -> Result<Response, EngineError> {
        let empty = IndexMap::new();
        let values = request.values().unwrap_or(&empty);
        let assignments = insert_assignments(data_source, values)?;
        let insert = MutationBuilder::new(data_source).insert(&assignments)?;

        let mut session = self.session(data_source, true).await?;
        let result = self
            .insert_and_refetch(session.as_mut(), data_source, &insert, depth)
            .await;
        finish(session, result).await
    }

    async fn insert_and_refetch(
        &self,
        session: &mut Session,
        data_source: &DataSource,
        insert: &BuiltQuery,
        depth: usize,
    ) -> Result<Response, EngineError> {
        let rows = session.fetch(insert).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::decode("RETURNING", "insert returned no row"))?;

        let mut keys = IndexMap::new();
        for (pk, value) in data_source.require_primary_keys()?.into_iter().zip(row) {
            let value = FieldValue::from_sql(value, pk.field_type).map_err(|message| {
                EngineError::RowMapping {
                    field: pk.name.clone(),
                    message,
                }
            })?;
            keys.insert(pk.name.clone(), value.to_json());
        }
        debug!(data_source = %data_source.id, keys = ?keys, "Inserted record");

        let refetch = refetch_request(data_source, keys, None);
        self.fetch_on(session, data_source, &refetch, depth).await
    }

    pub(crate) async fn update(
        &self,
        data_source: &DataSource,
        request: &Request,
        depth: usize,
    ) -> Result<Response, EngineError> {
        let values = request
            .values()
            .ok_or_else(|| EngineError::field_invalid("data", "Update requires a values map"))?;
        let old_values = request.old_values.as_ref();

        let keys = primary_key_values(data_source, values, old_values)?;
        let assignments = modified_assignments(data_source, values, old_values)?;
        let statement = if assignments.is_empty() {
            debug!(data_source = %data_source.id, "No modified fields, skipping update");
            None
        } else {
            Some(MutationBuilder::new(data_source).update(&assignments, &keys)?)
        };
        let outputs = old_values.map(|old| refetch_outputs(data_source, old));
        let refetch = refetch_request(data_source, keys, outputs);

        let mut session = self.session(data_source, true).await?;
        let result: Result<Response, EngineError> = async {
            if let Some(statement) = &statement {
                let affected = session.execute(statement).await?;
                if affected == 0 {
                    return Err(EngineError::NoRowsUpdated {
                        data_source: data_source.id.clone(),
                    });
                }
                debug!(data_source = %data_source.id, affected, "Updated record");
            }
            let response = self
                .fetch_on(session.as_mut(), data_source, &refetch, depth)
                .await?;
            if statement.is_none() && response.is_empty() {
                return Err(EngineError::NoRowsUpdated {
                    data_source: data_source.id.clone(),
                });
            }
            Ok(response)
        }
        .await;
        finish(session, result).await
    }

    pub(crate) async fn remove(
        &self,
        data_source: &DataSource,
        request: &Request,
    ) -> Result<Response, EngineError> {
        let empty = IndexMap::new();
        let values = request.values().unwrap_or(&empty);
        let keys = primary_key_values(data_source, values, None)?;
        let delete = MutationBuilder::new(data_source).delete(&keys)?;
        let echoed = echo_keys(data_source, &keys)?;

        let mut session = self.session(data_source, true).await?;
        let result: Result<Response, EngineError> = async {
            let affected = session.execute(&delete).await?;
            if affected == 0 {
                return Err(EngineError::NoRowsRemoved {
                    data_source: data_source.id.clone(),
                });
            }
            debug!(data_source = %data_source.id, affected, "Removed record");
            Ok(echoed)
        }
        .await;
        finish(session, result).await
    }
}

/// Checks required fields and converts payload values for an INSERT.
///
/// All missing required fields are reported together.
fn insert_assignments<'a>(
    data_source: &'a DataSource,
    values: &IndexMap<String, Value>,
) -> Result<Assignments<'a>, EngineError> {
    let mut errors = IndexMap::new();
    for field in data_source.fields() {
        let writable = field.is_local_column() && field.kind() != FieldType::Sequence;
        if field.required && writable && values.get(&field.name).is_none_or(Value::is_null) {
            errors.insert(field.name.clone(), REQUIRED_MESSAGE.to_string());
        }
    }
    if !errors.is_empty() {
        return Err(EngineError::Validation { errors });
    }

    let mut assignments = Vec::new();
    for (name, value) in values {
        if is_metadata_key(name) {
            continue;
        }
        let field = known_field(data_source, name)?;
        if !field.is_local_column() || (field.kind() == FieldType::Sequence && value.is_null()) {
            continue;
        }
        assignments.push((field, convert(field, value)?));
    }
    Ok(assignments)
}

/// Local editable non-key fields whose value differs from the old record.
fn modified_assignments<'a>(
    data_source: &'a DataSource,
    values: &IndexMap<String, Value>,
    old_values: Option<&IndexMap<String, Value>>,
) -> Result<Assignments<'a>, EngineError> {
    let mut assignments = Vec::new();
    for (name, value) in values {
        if is_metadata_key(name) {
            continue;
        }
        let field = known_field(data_source, name)?;
        if field.primary_key || !field.can_edit || !field.is_local_column() {
            continue;
        }
        if old_values.and_then(|old| old.get(name)) == Some(value) {
            continue;
        }
        assignments.push((field, convert(field, value)?));
    }
    Ok(assignments)
}

/// Primary-key values from the payload, falling back to `old_values`.
fn primary_key_values(
    data_source: &DataSource,
    values: &IndexMap<String, Value>,
    old_values: Option<&IndexMap<String, Value>>,
) -> Result<IndexMap<String, Value>, EngineError> {
    let mut keys = IndexMap::new();
    let mut errors = IndexMap::new();
    for pk in data_source.require_primary_keys()? {
        let value = values
            .get(&pk.name)
            .or_else(|| old_values.and_then(|old| old.get(&pk.name)))
            .filter(|v| !v.is_null());
        match value {
            Some(value) => {
                keys.insert(pk.name.clone(), value.clone());
            }
            None => {
                errors.insert(pk.name.clone(), "Primary key value is required".to_string());
            }
        }
    }
    if errors.is_empty() {
        Ok(keys)
    } else {
        Err(EngineError::Validation { errors })
    }
}

/// Re-fetch outputs for an update: the old record's keys that name fields.
fn refetch_outputs(data_source: &DataSource, old_values: &IndexMap<String, Value>) -> String {
    old_values
        .keys()
        .filter(|k| !is_metadata_key(k) && data_source.find_field(k).is_some())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

fn refetch_request(
    data_source: &DataSource,
    keys: IndexMap<String, Value>,
    outputs: Option<String>,
) -> Request {
    let request = Request::fetch(data_source.id.clone())
        .with_criteria(Criteria::Map(keys))
        .with_text_match_style(TextMatchStyle::ExactCase);
    match outputs.filter(|o| !o.is_empty()) {
        Some(outputs) => request.with_outputs(&outputs),
        None => request,
    }
}

fn echo_keys(
    data_source: &DataSource,
    keys: &IndexMap<String, Value>,
) -> Result<Response, EngineError> {
    let mut row = Vec::with_capacity(keys.len());
    for (name, value) in keys {
        let field = known_field(data_source, name)?;
        let value = SqlValue::from_json(value, field.field_type)
            .and_then(|v| FieldValue::from_sql(v, field.field_type))
            .map_err(|message| EngineError::field_invalid(name, message))?;
        row.push(value);
    }
    Ok(Response::success(keys.keys().cloned().collect(), vec![row], 0, 1))
}

fn known_field<'a>(data_source: &'a DataSource, name: &str) -> Result<&'a Field, EngineError> {
    data_source
        .find_field(name)
        .ok_or_else(|| EngineError::field_invalid(name, "Unknown field"))
}

fn convert(field: &Field, value: &Value) -> Result<SqlValue, EngineError> {
    SqlValue::from_json(value, field.field_type)
        .map_err(|message| EngineError::field_invalid(&field.name, message))
}

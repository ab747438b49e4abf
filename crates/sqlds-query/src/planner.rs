//! FETCH selection planning.
//!
//! Decides what the inner SELECT of a fetch produces: the requested outputs,
//! the extra fields criteria and sort need, the key columns deferred relations
//! need, and the joins include-from fields pull in. Every selected expression
//! gets an alias of the form `<ownerAlias>__<column>`, where the root owner
//! alias is the table name and a joined table's alias is the path that reached
//! it (`employee__location_id`). Two foreign keys to the same table therefore
//! never share an alias.

use std::collections::HashMap;

use sqlds_core::{
    DataSource, Field, FieldType, OperationBinding, Request, SchemaError, is_metadata_key,
};

use crate::criteria::{ColumnLookup, ColumnRef, collect_referenced_fields};
use crate::error::QueryError;
use crate::relation::{RelationResolver, SubFetchRelation, parse_reference};
use crate::sql_builder::{escape_identifier, escape_qualified, root_alias};

/// Postgres truncates identifiers past 63 bytes.
const MAX_ALIAS_LEN: usize = 60;

/// Why an item is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRole {
    /// Returned to the caller.
    Output,
    /// Needed only by WHERE or ORDER BY.
    Extra,
    /// Needed only as the lookup key of a deferred relation.
    Key,
}

/// One expression of the inner SELECT.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub name: String,
    /// Unquoted alias.
    pub alias: String,
    pub expression: String,
    pub field_type: Option<FieldType>,
    pub role: ItemRole,
}

/// A `LEFT OUTER JOIN` of the inner query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub alias: String,
    pub table: String,
    pub source_alias: String,
    pub source_column: String,
    pub target_column: String,
}

/// A field whose value comes from a nested fetch per row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredField {
    pub name: String,
    /// Position in the response row.
    pub output_index: usize,
    pub relation: SubFetchRelation,
    /// Item holding the local key value.
    pub key_item: usize,
    /// Outputs for the nested fetch; `None` means all fields.
    pub outputs: Option<Vec<String>>,
}

/// The selection plan of one FETCH.
#[derive(Debug, Clone)]
pub struct FetchPlan {
    pub data_source: String,
    pub table: String,
    pub root_alias: String,
    pub items: Vec<SelectItem>,
    pub joins: Vec<JoinSpec>,
    /// Response field names, in request order.
    pub output_names: Vec<String>,
    /// Item index for each response field.
    pub outputs: Vec<usize>,
    pub deferred: Vec<DeferredField>,
    by_name: HashMap<String, usize>,
}

impl FetchPlan {
    pub fn item(&self, name: &str) -> Option<&SelectItem> {
        self.by_name.get(name).map(|&i| &self.items[i])
    }

    /// Declared type of each response field.
    pub fn output_types(&self) -> Vec<Option<FieldType>> {
        self.outputs.iter().map(|&i| self.items[i].field_type).collect()
    }
}

impl ColumnLookup for FetchPlan {
    fn column(&self, field: &str) -> Option<ColumnRef> {
        let item = self.item(field)?;
        Some(ColumnRef {
            sql: format!("\"{}\"", item.alias),
            field_type: item.field_type,
        })
    }
}

/// A parsed `localField!ForeignDsId.foreignField` entry.
#[derive(Debug, Clone)]
struct AdditionalOutput {
    token: String,
    local: String,
    data_source: String,
    field: String,
}

impl AdditionalOutput {
    fn parse(token: &str) -> Result<Self, SchemaError> {
        let (local, reference) = token
            .split_once('!')
            .ok_or_else(|| SchemaError::malformed_relation(token, token))?;
        let (data_source, field) = parse_reference(token, reference)?;
        if local.is_empty() {
            return Err(SchemaError::malformed_relation(token, token));
        }
        Ok(Self {
            token: token.to_string(),
            local: local.to_string(),
            data_source: data_source.to_string(),
            field: field.to_string(),
        })
    }
}

/// Builds [`FetchPlan`]s.
pub struct FetchPlanner<'a> {
    resolver: RelationResolver<'a>,
}

impl<'a> FetchPlanner<'a> {
    pub fn new(resolver: RelationResolver<'a>) -> Self {
        Self { resolver }
    }

    pub fn plan(
        &self,
        data_source: &DataSource,
        request: &Request,
        binding: Option<&OperationBinding>,
    ) -> Result<FetchPlan, QueryError> {
        let excluded = |name: &str| binding.is_some_and(|b| b.excludes(name));

        // Additional outputs either extend a deferred field's nested outputs
        // or import a foreign value through a local foreign key.
        let mut sub_outputs: HashMap<String, Vec<String>> = HashMap::new();
        let mut synthetic = Vec::new();
        for token in request.additional_output_entries() {
            let extra = AdditionalOutput::parse(&token)?;
            let local = data_source.field(&extra.local)?;
            if local.needs_sub_fetch() {
                sub_outputs.entry(local.name.clone()).or_default().push(extra.field);
            } else {
                synthetic.push(self.synthetic_field(&extra)?);
            }
        }

        let mut fields: Vec<Field> = Vec::new();
        match request.output_names() {
            Some(names) => {
                for name in names {
                    match data_source.find_field(&name) {
                        Some(f) => fields.push(f.clone()),
                        None if excluded(&name) => {}
                        None => {
                            return Err(QueryError::unknown_output_field(&data_source.id, &name));
                        }
                    }
                }
            }
            None => fields.extend(data_source.fields().iter().cloned()),
        }
        for field in synthetic {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }

        let mut extras = Vec::new();
        let referenced = request
            .data
            .as_ref()
            .map(collect_referenced_fields)
            .unwrap_or_default();
        for name in referenced {
            if fields.iter().any(|f| f.name == name) || excluded(&name) || is_metadata_key(&name) {
                continue;
            }
            let field = data_source
                .find_field(&name)
                .ok_or_else(|| QueryError::unknown_filter_field(&data_source.id, &name))?;
            extras.push(field.clone());
        }
        for token in &request.sort_by {
            let name = sort_field_name(token);
            if fields.iter().chain(extras.iter()).any(|f| f.name == name) {
                continue;
            }
            let field = data_source
                .find_field(name)
                .ok_or_else(|| QueryError::unknown_sort_field(&data_source.id, name))?;
            extras.push(field.clone());
        }

        let mut builder = PlanBuilder::new(data_source)?;

        for field in &fields {
            let item = builder.add_field(&self.resolver, data_source, field, ItemRole::Output)?;
            let output_index = builder.output_names.len();
            builder.output_names.push(field.name.clone());
            builder.outputs.push(item);

            if field.needs_sub_fetch() {
                let relation = self.resolver.resolve_sub_fetch(data_source, field)?;
                let key_item = if relation.to_many {
                    let key = data_source.field(&relation.local_key_field)?;
                    builder.add_field(&self.resolver, data_source, key, ItemRole::Key)?
                } else {
                    item
                };
                let outputs = self.sub_fetch_outputs(field, &relation, &mut sub_outputs)?;
                builder.deferred.push(DeferredField {
                    name: field.name.clone(),
                    output_index,
                    relation,
                    key_item,
                    outputs,
                });
            }
        }
        for field in &extras {
            builder.add_field(&self.resolver, data_source, field, ItemRole::Extra)?;
        }

        let plan = builder.finish();
        tracing::debug!(
            data_source = %plan.data_source,
            items = plan.items.len(),
            joins = plan.joins.len(),
            deferred = plan.deferred.len(),
            "Planned fetch"
        );
        Ok(plan)
    }

    /// Field for an additional output importing a foreign value.
    fn synthetic_field(&self, extra: &AdditionalOutput) -> Result<Field, QueryError> {
        let foreign = self.resolver.registry().require(&extra.data_source)?;
        let target = foreign.field(&extra.field)?;
        let mut field = Field::untyped(extra.token.clone())
            .with_include_from(format!("{}.{}", extra.data_source, extra.field))
            .with_include_via(extra.local.clone())
            .with_can_edit(false);
        field.field_type = target.field_type;
        Ok(field)
    }

    /// Outputs of the nested fetch for a deferred field.
    ///
    /// Additional outputs naming the field win. Otherwise a typed field fetches
    /// every foreign field and an untyped one only the foreign primary key.
    fn sub_fetch_outputs(
        &self,
        field: &Field,
        relation: &SubFetchRelation,
        sub_outputs: &mut HashMap<String, Vec<String>>,
    ) -> Result<Option<Vec<String>>, QueryError> {
        if let Some(outputs) = sub_outputs.remove(&field.name) {
            return Ok(Some(outputs));
        }
        if field.has_declared_type() {
            return Ok(None);
        }
        let foreign = self.resolver.registry().require(&relation.foreign_data_source)?;
        let keys = foreign.require_primary_keys()?;
        Ok(Some(keys.into_iter().map(|k| k.name.clone()).collect()))
    }
}

/// Strips the direction prefix of a sort token.
pub fn sort_field_name(token: &str) -> &str {
    token
        .trim()
        .strip_prefix(['-', '+'])
        .unwrap_or_else(|| token.trim())
}

struct PlanBuilder {
    data_source: String,
    table: String,
    root_alias: String,
    items: Vec<SelectItem>,
    joins: Vec<JoinSpec>,
    join_keys: HashMap<(String, String, String, String), usize>,
    output_names: Vec<String>,
    outputs: Vec<usize>,
    deferred: Vec<DeferredField>,
    by_name: HashMap<String, usize>,
}

impl PlanBuilder {
    fn new(data_source: &DataSource) -> Result<Self, QueryError> {
        escape_qualified(&data_source.table_name)?;
        Ok(Self {
            data_source: data_source.id.clone(),
            table: data_source.table_name.clone(),
            root_alias: root_alias(&data_source.table_name),
            items: Vec::new(),
            joins: Vec::new(),
            join_keys: HashMap::new(),
            output_names: Vec::new(),
            outputs: Vec::new(),
            deferred: Vec::new(),
            by_name: HashMap::new(),
        })
    }

    /// Adds the select item for `field`, reusing an existing one for the same
    /// field or expression.
    fn add_field(
        &mut self,
        resolver: &RelationResolver<'_>,
        data_source: &DataSource,
        field: &Field,
        role: ItemRole,
    ) -> Result<usize, QueryError> {
        if let Some(&idx) = self.by_name.get(&field.name) {
            if role == ItemRole::Output {
                self.items[idx].role = ItemRole::Output;
            }
            return Ok(idx);
        }

        let column = field.db_column();
        let (owner, col, expression, field_type) = if field.needs_sub_fetch() && field.multiple {
            let target = field.foreign_key.as_deref().unwrap_or_default().replace("*/", "");
            (
                self.root_alias.clone(),
                column.to_string(),
                format!("NULL /* deferred: {target} */"),
                field.field_type,
            )
        } else if field.is_include_from() {
            let relation = resolver.resolve_include_from(data_source, field)?;
            let mut source_alias = self.root_alias.clone();
            for hop in &relation.hops {
                source_alias = self.add_join(
                    &source_alias,
                    &hop.source_column,
                    &hop.target_table,
                    &hop.target_column,
                )?;
            }
            let expression = match &relation.custom_select_expression {
                Some(expr) => format!("({expr})"),
                None => format!(
                    "{}.{}",
                    escape_identifier(&source_alias)?,
                    escape_identifier(&relation.target_column)?
                ),
            };
            (
                source_alias,
                relation.target_column.clone(),
                expression,
                field.field_type.or(relation.target_type),
            )
        } else if let Some(expr) = &field.custom_select_expression {
            (
                self.root_alias.clone(),
                column.to_string(),
                format!("({expr})"),
                field.field_type,
            )
        } else {
            (
                self.root_alias.clone(),
                column.to_string(),
                format!(
                    "{}.{}",
                    escape_identifier(&self.root_alias)?,
                    escape_identifier(column)?
                ),
                field.field_type,
            )
        };

        if let Some(idx) = self.items.iter().position(|i| i.expression == expression) {
            self.by_name.insert(field.name.clone(), idx);
            if role == ItemRole::Output {
                self.items[idx].role = ItemRole::Output;
            }
            return Ok(idx);
        }

        let alias = self.unique_alias(&format!("{owner}__{col}"));
        escape_identifier(&alias)?;
        let idx = self.items.len();
        self.items.push(SelectItem {
            name: field.name.clone(),
            alias,
            expression,
            field_type,
            role,
        });
        self.by_name.insert(field.name.clone(), idx);
        Ok(idx)
    }

    /// Adds a join unless the same (source, column, table, target) is already
    /// joined; returns the joined table's alias.
    fn add_join(
        &mut self,
        source_alias: &str,
        source_column: &str,
        table: &str,
        target_column: &str,
    ) -> Result<String, QueryError> {
        let key = (
            source_alias.to_string(),
            source_column.to_string(),
            table.to_string(),
            target_column.to_string(),
        );
        if let Some(&idx) = self.join_keys.get(&key) {
            return Ok(self.joins[idx].alias.clone());
        }

        escape_qualified(table)?;
        escape_identifier(source_column)?;
        escape_identifier(target_column)?;

        let alias = truncate_alias(&format!("{source_alias}__{source_column}"), self.joins.len());
        self.join_keys.insert(key, self.joins.len());
        self.joins.push(JoinSpec {
            alias: alias.clone(),
            table: table.to_string(),
            source_alias: source_alias.to_string(),
            source_column: source_column.to_string(),
            target_column: target_column.to_string(),
        });
        Ok(alias)
    }

    fn unique_alias(&self, base: &str) -> String {
        let base = truncate_alias(base, self.items.len());
        if !self.items.iter().any(|i| i.alias == base) {
            return base;
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.items.iter().any(|i| &i.alias == candidate))
            .unwrap_or(base)
    }

    fn finish(self) -> FetchPlan {
        FetchPlan {
            data_source: self.data_source,
            table: self.table,
            root_alias: self.root_alias,
            items: self.items,
            joins: self.joins,
            output_names: self.output_names,
            outputs: self.outputs,
            deferred: self.deferred,
            by_name: self.by_name,
        }
    }
}

fn truncate_alias(alias: &str, salt: usize) -> String {
    if alias.len() <= MAX_ALIAS_LEN {
        return alias.to_string();
    }
    let head: String = alias.chars().take(MAX_ALIAS_LEN - 8).collect();
    format!("{head}_{salt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::RelationResolver;
    use serde_json::json;
    use sqlds_core::{DataSourceRegistry, OperationType};

    fn registry() -> DataSourceRegistry {
        DataSourceRegistry::from_data_sources([
            DataSource::new("CountryDS", "country")
                .with_field(Field::new("id", FieldType::Integer).with_primary_key())
                .with_field(Field::new("name", FieldType::Text)),
            DataSource::new("LocationDS", "location")
                .with_field(Field::new("id", FieldType::Integer).with_primary_key())
                .with_field(Field::new("city", FieldType::Text))
                .with_field(
                    Field::new("country_id", FieldType::Integer)
                        .with_foreign_key("CountryDS.id")
                        .with_display_field("country_name"),
                )
                .with_field(
                    Field::new("country_name", FieldType::Text)
                        .with_include_from("CountryDS.name"),
                ),
            DataSource::new("EmployeeDS", "employee")
                .with_field(Field::new("id", FieldType::Integer).with_primary_key())
                .with_field(Field::new("name", FieldType::Text))
                .with_field(Field::new("email", FieldType::Text))
                .with_field(
                    Field::new("location_id", FieldType::Integer)
                        .with_foreign_key("LocationDS.id")
                        .with_display_field("city"),
                )
                .with_field(
                    Field::new("backup_location_id", FieldType::Integer)
                        .with_foreign_key("LocationDS.id"),
                )
                .with_field(Field::new("city", FieldType::Text).with_include_from("LocationDS.city"))
                .with_field(
                    Field::new("country_name", FieldType::Text)
                        .with_include_from("LocationDS.country_name")
                        .with_include_via("location_id"),
                )
                .with_field(
                    Field::new("roles", FieldType::Entity)
                        .with_foreign_key("EmployeeRoleDS.employee_id")
                        .with_multiple(),
                ),
            DataSource::new("EmployeeRoleDS", "employee_role")
                .with_field(Field::new("id", FieldType::Integer).with_primary_key())
                .with_field(
                    Field::new("employee_id", FieldType::Integer).with_foreign_key("EmployeeDS.id"),
                )
                .with_field(Field::new("role", FieldType::Text)),
        ])
        .unwrap()
    }

    fn plan(request: &Request) -> Result<FetchPlan, QueryError> {
        let registry = registry();
        let ds = registry.require("EmployeeDS").unwrap();
        FetchPlanner::new(RelationResolver::new(&registry)).plan(&ds, request, None)
    }

    #[test]
    fn test_requested_outputs_in_order() {
        let plan = plan(&Request::fetch("EmployeeDS").with_outputs("email, id")).unwrap();
        assert_eq!(plan.output_names, vec!["email", "id"]);
        assert_eq!(plan.items[plan.outputs[0]].alias, "employee__email");
        assert_eq!(plan.items[plan.outputs[1]].expression, "\"employee\".\"id\"");
        assert!(plan.joins.is_empty());
    }

    #[test]
    fn test_extras_selected_but_not_output() {
        let request = Request::fetch("EmployeeDS")
            .with_outputs("id")
            .with_criteria(sqlds_core::Criteria::Map(
                serde_json::from_value(json!({"name": "A"})).unwrap(),
            ))
            .with_sort(&["-email"]);
        let plan = plan(&request).unwrap();

        assert_eq!(plan.output_names, vec!["id"]);
        let extras: Vec<_> = plan
            .items
            .iter()
            .filter(|i| i.role == ItemRole::Extra)
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(extras, vec!["name", "email"]);
    }

    #[test]
    fn test_joins_deduplicated_and_path_aliased() {
        let plan = plan(&Request::fetch("EmployeeDS").with_outputs("city,country_name")).unwrap();

        let joins: Vec<_> = plan.joins.iter().map(|j| (j.alias.as_str(), j.table.as_str())).collect();
        assert_eq!(
            joins,
            vec![
                ("employee__location_id", "location"),
                ("employee__location_id__country_id", "country"),
            ]
        );
        assert_eq!(
            plan.item("country_name").unwrap().alias,
            "employee__location_id__country_id__name"
        );
        assert_eq!(plan.item("city").unwrap().alias, "employee__location_id__city");
    }

    #[test]
    fn test_deferred_to_many_field() {
        let plan = plan(&Request::fetch("EmployeeDS").with_outputs("name,roles")).unwrap();

        let roles = plan.item("roles").unwrap();
        assert!(roles.expression.starts_with("NULL /* deferred: EmployeeRoleDS.employee_id"));
        assert_eq!(plan.deferred.len(), 1);

        let deferred = &plan.deferred[0];
        assert_eq!(deferred.output_index, 1);
        assert_eq!(plan.items[deferred.key_item].name, "id");
        assert_eq!(plan.items[deferred.key_item].role, ItemRole::Key);
        assert_eq!(deferred.outputs, None);
        assert_eq!(plan.output_names, vec!["name", "roles"]);
    }

    #[test]
    fn test_additional_outputs() {
        let request = Request::fetch("EmployeeDS")
            .with_outputs("id,roles")
            .with_additional_outputs("roles!EmployeeRoleDS.role, backup_location_id!LocationDS.city");
        let plan = plan(&request).unwrap();

        assert_eq!(plan.deferred[0].outputs, Some(vec!["role".to_string()]));
        assert_eq!(
            plan.output_names,
            vec!["id", "roles", "backup_location_id!LocationDS.city"]
        );
        assert_eq!(
            plan.item("backup_location_id!LocationDS.city").unwrap().alias,
            "employee__backup_location_id__city"
        );
    }

    #[test]
    fn test_unknown_output_field() {
        let err = plan(&Request::fetch("EmployeeDS").with_outputs("id,salary")).unwrap_err();
        assert_eq!(err, QueryError::unknown_output_field("EmployeeDS", "salary"));
    }

    #[test]
    fn test_excluded_output_field_dropped() {
        let registry = registry();
        let ds = registry.require("EmployeeDS").unwrap();
        let binding = OperationBinding::new(OperationType::Fetch).with_excluded_criteria(&["salary"]);
        let plan = FetchPlanner::new(RelationResolver::new(&registry))
            .plan(
                &ds,
                &Request::fetch("EmployeeDS").with_outputs("id,salary"),
                Some(&binding),
            )
            .unwrap();
        assert_eq!(plan.output_names, vec!["id"]);
    }

    #[test]
    fn test_unknown_sort_field() {
        let err = plan(&Request::fetch("EmployeeDS").with_sort(&["+salary"])).unwrap_err();
        assert_eq!(err, QueryError::unknown_sort_field("EmployeeDS", "salary"));
    }

    #[test]
    fn test_sort_field_name() {
        assert_eq!(sort_field_name("-name"), "name");
        assert_eq!(sort_field_name("+name"), "name");
        assert_eq!(sort_field_name(" name "), "name");
    }
}

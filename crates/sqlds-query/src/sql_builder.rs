//! SQL statement assembly.
//!
//! FETCH is assembled as a derived table. The inner query selects every
//! planned item under its alias and carries FROM and the joins; the outer
//! query filters, sorts and pages over those aliases:
//!
//! ```text
//! SELECT "employee__id", "employee__name"
//! FROM (SELECT "employee"."id" AS "employee__id", ... FROM "employee" AS "employee"
//!       LEFT OUTER JOIN ...) q
//! WHERE "employee__name" LIKE ? ESCAPE '\'
//! ORDER BY "employee__name" ASC
//! LIMIT 2 OFFSET 2
//! ```
//!
//! The count query wraps the same inner query with the same WHERE, so both
//! bind identical parameters in identical order.

use indexmap::IndexMap;
use serde_json::Value;
use sqlds_core::{
    BuiltQuery, Criteria, DataSource, Field, OperationBinding, Request, SchemaError, SqlValue,
    TextMatchStyle,
};

use crate::criteria::{ColumnLookup, ColumnRef, CompiledCriteria, CriteriaCompiler};
use crate::error::QueryError;
use crate::planner::{FetchPlan, sort_field_name};
use crate::template::{SqlFragment, TemplateContext};

/// Maximum number of JOINs in one FETCH.
const MAX_JOINS: usize = 32;

/// A custom query referencing one of these filters by itself.
const WHERE_VARIABLES: [&str; 2] = ["${defaultWhereClause}", "${whereClause}"];

// ============================================================================
// Identifiers
// ============================================================================

fn validate_identifier(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::InvalidIdentifier("Empty identifier".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SchemaError::InvalidIdentifier(name.to_string()));
    }
    Ok(())
}

/// Validates and double-quotes a table or column name.
pub fn escape_identifier(name: &str) -> Result<String, SchemaError> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Quotes a possibly schema-qualified table name part by part.
pub fn escape_qualified(name: &str) -> Result<String, SchemaError> {
    let parts = name
        .split('.')
        .map(escape_identifier)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join("."))
}

/// Alias of the root table: the table name with schema dots flattened.
pub fn root_alias(table: &str) -> String {
    table.replace('.', "_")
}

// ============================================================================
// FETCH
// ============================================================================

/// FETCH and count statements for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledFetch {
    pub query: BuiltQuery,
    pub count: BuiltQuery,
    /// Page size; `Some(0)` means the page is empty and the data query can be skipped.
    pub limit: Option<u64>,
    /// Leading rows to drop while mapping, when an unbounded page starts past 0.
    pub skip_rows: u64,
}

/// Assembles FETCH statements from a plan.
pub struct FetchAssembler<'a> {
    plan: &'a FetchPlan,
    binding: Option<&'a OperationBinding>,
    text_match_style: TextMatchStyle,
    max_page_size: Option<u64>,
}

impl<'a> FetchAssembler<'a> {
    pub fn new(plan: &'a FetchPlan) -> Self {
        Self {
            plan,
            binding: None,
            text_match_style: TextMatchStyle::default(),
            max_page_size: None,
        }
    }

    #[must_use]
    pub fn with_binding(mut self, binding: Option<&'a OperationBinding>) -> Self {
        self.binding = binding;
        self
    }

    #[must_use]
    pub fn with_text_match_style(mut self, style: TextMatchStyle) -> Self {
        self.text_match_style = style;
        self
    }

    #[must_use]
    pub fn with_max_page_size(mut self, max: Option<u64>) -> Self {
        self.max_page_size = max;
        self
    }

    pub fn assemble(&self, request: &Request) -> Result<AssembledFetch, QueryError> {
        if self.plan.joins.len() > MAX_JOINS {
            return Err(QueryError::QueryTooComplex(format!(
                "Too many JOINs: {} (max {MAX_JOINS})",
                self.plan.joins.len()
            )));
        }

        let criteria = request.data.as_ref();
        let compiled = self.compile_criteria(criteria, self.plan)?;

        let mut ctx = TemplateContext::new(criteria);
        let select = SqlFragment::text(self.select_clause()?);
        ctx.set("defaultSelectClause", select.clone());
        ctx.set("selectClause", select.clone());

        let default_table = SqlFragment::text(format!(
            "{} AS {}",
            escape_qualified(&self.plan.table)?,
            escape_identifier(&self.plan.root_alias)?
        ));
        ctx.set("defaultTableClause", default_table.clone());
        let table = match self.binding.and_then(|b| b.table_clause.as_deref()) {
            Some(template) => ctx.interpolate(template)?,
            None => default_table,
        };
        ctx.set("tableClause", table.clone());

        let default_join = SqlFragment::text(self.join_clause()?);
        ctx.set("defaultJoinClause", default_join.clone());
        let join = match self.binding.and_then(|b| b.ansi_join_clause.as_deref()) {
            Some(template) => ctx.interpolate(template)?,
            None => default_join,
        };
        ctx.set("joinClause", join.clone());

        let where_template = self.binding.and_then(|b| b.where_clause.as_deref());
        let mut where_consumed = false;
        let inner = match self.binding.and_then(|b| b.custom_sql.as_deref()) {
            Some(template) => {
                // Inside the custom query only the unaliased expressions exist.
                let inner_where =
                    predicate(self.compile_criteria(criteria, &InnerColumns(self.plan))?);
                ctx.set("defaultWhereClause", inner_where.clone());
                let effective = match where_template {
                    Some(t) => ctx.interpolate(t)?,
                    None => inner_where,
                };
                ctx.set("whereClause", effective);
                where_consumed = WHERE_VARIABLES.iter().any(|v| template.contains(v));
                ctx.interpolate(template)?
            }
            None => {
                let mut sql = format!("SELECT {} FROM {}", select.sql, table.sql);
                if !join.sql.is_empty() {
                    sql.push(' ');
                    sql.push_str(&join.sql);
                }
                let mut params = table.params;
                params.extend(join.params);
                SqlFragment::new(sql, params)
            }
        };

        let default_where = SqlFragment::new(compiled.sql, compiled.params);
        ctx.set("defaultWhereClause", predicate_of(&default_where));
        let filter = match where_template {
            _ if where_consumed => SqlFragment::default(),
            Some(template) => ctx.interpolate(template)?,
            None => default_where,
        };

        let mut tail = String::new();
        if !filter.sql.trim().is_empty() {
            tail.push_str(" WHERE ");
            tail.push_str(&filter.sql);
        }
        let mut params = inner.params;
        params.extend(filter.params);

        let count = BuiltQuery::new(
            format!("SELECT count(*) FROM ({}) q{tail}", inner.sql),
            params.clone(),
        );

        let order = self.order_clause(&request.sort_by)?;
        if !order.is_empty() {
            tail.push_str(" ORDER BY ");
            tail.push_str(&order);
        }

        let (limit, offset, skip_rows) =
            page(request.start_row, request.bounded_end(), self.max_page_size);
        if let Some(size) = limit.filter(|&n| n > 0) {
            tail.push_str(&format!(" LIMIT {size}"));
            if offset > 0 {
                tail.push_str(&format!(" OFFSET {offset}"));
            }
        }

        let outer_columns = self
            .plan
            .items
            .iter()
            .map(|i| escape_identifier(&i.alias))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let query = BuiltQuery::new(
            format!("SELECT {outer_columns} FROM ({}) q{tail}", inner.sql),
            params,
        );

        tracing::debug!(
            data_source = %self.plan.data_source,
            sql = %query.sql,
            params = query.params.len(),
            "Assembled fetch"
        );

        Ok(AssembledFetch {
            query,
            count,
            limit,
            skip_rows,
        })
    }

    fn compile_criteria(
        &self,
        criteria: Option<&Criteria>,
        lookup: &dyn ColumnLookup,
    ) -> Result<CompiledCriteria, QueryError> {
        match criteria {
            Some(c) => CriteriaCompiler::new(&self.plan.data_source, lookup)
                .with_text_match_style(self.text_match_style)
                .with_binding(self.binding)
                .compile(c),
            None => Ok(CompiledCriteria::default()),
        }
    }

    fn select_clause(&self) -> Result<String, QueryError> {
        let items = self
            .plan
            .items
            .iter()
            .map(|i| Ok(format!("{} AS {}", i.expression, escape_identifier(&i.alias)?)))
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(items.join(", "))
    }

    fn join_clause(&self) -> Result<String, QueryError> {
        let joins = self
            .plan
            .joins
            .iter()
            .map(|j| {
                let alias = escape_identifier(&j.alias)?;
                Ok(format!(
                    "LEFT OUTER JOIN {} AS {alias} ON {alias}.{} = {}.{}",
                    escape_qualified(&j.table)?,
                    escape_identifier(&j.target_column)?,
                    escape_identifier(&j.source_alias)?,
                    escape_identifier(&j.source_column)?,
                ))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(joins.join(" "))
    }

    fn order_clause(&self, sort_by: &[String]) -> Result<String, QueryError> {
        let parts = sort_by
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|token| {
                let name = sort_field_name(token);
                let item = self
                    .plan
                    .item(name)
                    .ok_or_else(|| QueryError::unknown_sort_field(&self.plan.data_source, name))?;
                let direction = if token.trim().starts_with('-') { "DESC" } else { "ASC" };
                Ok(format!("{} {direction}", escape_identifier(&item.alias)?))
            })
            .collect::<Result<Vec<_>, QueryError>>()?;
        Ok(parts.join(", "))
    }
}

/// Plan fields by their inner-query expressions.
struct InnerColumns<'a>(&'a FetchPlan);

impl ColumnLookup for InnerColumns<'_> {
    fn column(&self, field: &str) -> Option<ColumnRef> {
        let item = self.0.item(field)?;
        Some(ColumnRef {
            sql: item.expression.clone(),
            field_type: item.field_type,
        })
    }
}

/// A where fragment usable after `WHERE` or `AND` in a template; matches
/// everything when the criteria filter nothing.
fn predicate(compiled: CompiledCriteria) -> SqlFragment {
    predicate_of(&SqlFragment::new(compiled.sql, compiled.params))
}

fn predicate_of(fragment: &SqlFragment) -> SqlFragment {
    if fragment.sql.trim().is_empty() {
        SqlFragment::text("1 = 1")
    } else {
        fragment.clone()
    }
}

/// `(limit, offset, skip_rows)` for a requested row range.
fn page(start: u64, end: Option<u64>, max: Option<u64>) -> (Option<u64>, u64, u64) {
    match (end, max) {
        (Some(end), max) => {
            let size = end.saturating_sub(start);
            (Some(max.map_or(size, |m| size.min(m))), start, 0)
        }
        (None, Some(max)) => (Some(max), start, 0),
        (None, None) => (None, 0, start),
    }
}

// ============================================================================
// ADD / UPDATE / REMOVE
// ============================================================================

/// Columns of the DataSource's own table, unqualified.
pub struct TableColumns<'a> {
    data_source: &'a DataSource,
}

impl<'a> TableColumns<'a> {
    pub fn new(data_source: &'a DataSource) -> Self {
        Self { data_source }
    }
}

impl ColumnLookup for TableColumns<'_> {
    fn column(&self, field: &str) -> Option<ColumnRef> {
        let field = self.data_source.find_field(field)?;
        if !field.is_local_column() {
            return None;
        }
        Some(ColumnRef {
            sql: escape_identifier(field.db_column()).ok()?,
            field_type: field.field_type,
        })
    }
}

/// Builds INSERT, UPDATE and DELETE statements for one DataSource.
pub struct MutationBuilder<'a> {
    data_source: &'a DataSource,
}

impl<'a> MutationBuilder<'a> {
    pub fn new(data_source: &'a DataSource) -> Self {
        Self { data_source }
    }

    /// `INSERT ... RETURNING <primary key columns>`.
    pub fn insert(&self, values: &[(&Field, SqlValue)]) -> Result<BuiltQuery, QueryError> {
        let table = escape_qualified(&self.data_source.table_name)?;
        let returning = self.returning_clause()?;

        if values.is_empty() {
            return Ok(BuiltQuery::new(
                format!("INSERT INTO {table} DEFAULT VALUES RETURNING {returning}"),
                Vec::new(),
            ));
        }

        let columns = values
            .iter()
            .map(|(f, _)| escape_identifier(f.db_column()))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; values.len()].join(", ");
        let params = values.iter().map(|(_, v)| v.clone()).collect();

        Ok(BuiltQuery::new(
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders}) RETURNING {returning}",
                columns.join(", ")
            ),
            params,
        ))
    }

    /// `UPDATE ... SET ... WHERE <keys>`; keys are matched case-sensitively.
    pub fn update(
        &self,
        values: &[(&Field, SqlValue)],
        keys: &IndexMap<String, Value>,
    ) -> Result<BuiltQuery, QueryError> {
        let table = escape_qualified(&self.data_source.table_name)?;
        let assignments = values
            .iter()
            .map(|(f, _)| Ok(format!("{} = ?", escape_identifier(f.db_column())?)))
            .collect::<Result<Vec<_>, QueryError>>()?;
        let predicate = self.key_predicate(keys)?;

        let mut params: Vec<SqlValue> = values.iter().map(|(_, v)| v.clone()).collect();
        params.extend(predicate.params);

        Ok(BuiltQuery::new(
            format!(
                "UPDATE {table} SET {} WHERE {}",
                assignments.join(", "),
                predicate.sql
            ),
            params,
        ))
    }

    /// `DELETE ... WHERE <keys>`; keys are matched case-sensitively.
    pub fn delete(&self, keys: &IndexMap<String, Value>) -> Result<BuiltQuery, QueryError> {
        let table = escape_qualified(&self.data_source.table_name)?;
        let predicate = self.key_predicate(keys)?;
        Ok(BuiltQuery::new(
            format!("DELETE FROM {table} WHERE {}", predicate.sql),
            predicate.params,
        ))
    }

    fn key_predicate(&self, keys: &IndexMap<String, Value>) -> Result<CompiledCriteria, QueryError> {
        let columns = TableColumns::new(self.data_source);
        let predicate = CriteriaCompiler::new(&self.data_source.id, &columns)
            .with_text_match_style(TextMatchStyle::ExactCase)
            .compile(&Criteria::Map(keys.clone()))?;
        if predicate.is_empty() {
            return Err(SchemaError::MissingPrimaryKey(self.data_source.id.clone()).into());
        }
        Ok(predicate)
    }

    fn returning_clause(&self) -> Result<String, QueryError> {
        let keys = self.data_source.require_primary_keys()?;
        let columns = keys
            .iter()
            .map(|k| escape_identifier(k.db_column()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::FetchPlanner;
    use crate::relation::RelationResolver;
    use serde_json::json;
    use sqlds_core::{DataSourceRegistry, FieldType, OperationType};

    fn registry() -> DataSourceRegistry {
        DataSourceRegistry::from_data_sources([
            DataSource::new("LocationDS", "location")
                .with_field(Field::new("id", FieldType::Integer).with_primary_key())
                .with_field(Field::new("city", FieldType::Text)),
            DataSource::new("EmployeeDS", "employee")
                .with_field(Field::new("id", FieldType::Sequence).with_primary_key())
                .with_field(Field::new("name", FieldType::Text))
                .with_field(Field::new("email", FieldType::Text))
                .with_field(
                    Field::new("location_id", FieldType::Integer)
                        .with_foreign_key("LocationDS.id")
                        .with_display_field("city"),
                )
                .with_field(Field::new("city", FieldType::Text).with_include_from("LocationDS.city")),
        ])
        .unwrap()
    }

    fn assemble(
        request: &Request,
        binding: Option<&OperationBinding>,
    ) -> Result<AssembledFetch, QueryError> {
        let registry = registry();
        let ds = registry.require("EmployeeDS").unwrap();
        let plan = FetchPlanner::new(RelationResolver::new(&registry)).plan(&ds, request, binding)?;
        FetchAssembler::new(&plan).with_binding(binding).assemble(request)
    }

    fn map(value: serde_json::Value) -> IndexMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(escape_identifier("employee").unwrap(), "\"employee\"");
        assert!(escape_identifier("x\"; DROP TABLE y").is_err());
        assert!(escape_identifier("").is_err());
        assert_eq!(escape_qualified("hr.employee").unwrap(), "\"hr\".\"employee\"");
        assert_eq!(root_alias("hr.employee"), "hr_employee");
    }

    #[test]
    fn test_fetch_with_join_sort_and_page() {
        let request = Request::fetch("EmployeeDS")
            .with_outputs("name,city")
            .with_criteria(Criteria::Map(map(json!({"name": "A"}))))
            .with_sort(&["-name"])
            .with_range(2, 4);
        let fetch = assemble(&request, None).unwrap();

        let inner = "SELECT \"employee\".\"name\" AS \"employee__name\", \
                     \"employee__location_id\".\"city\" AS \"employee__location_id__city\" \
                     FROM \"employee\" AS \"employee\" \
                     LEFT OUTER JOIN \"location\" AS \"employee__location_id\" \
                     ON \"employee__location_id\".\"id\" = \"employee\".\"location_id\"";
        assert_eq!(
            fetch.query.sql,
            format!(
                "SELECT \"employee__name\", \"employee__location_id__city\" FROM ({inner}) q \
                 WHERE \"employee__name\" LIKE ? ESCAPE '\\' \
                 ORDER BY \"employee__name\" DESC LIMIT 2 OFFSET 2"
            )
        );
        assert_eq!(
            fetch.count.sql,
            format!("SELECT count(*) FROM ({inner}) q WHERE \"employee__name\" LIKE ? ESCAPE '\\'")
        );
        assert_eq!(fetch.query.params, fetch.count.params);
        assert_eq!(fetch.query.params, vec![SqlValue::Text("A%".into())]);
        assert_eq!(fetch.limit, Some(2));
        assert_eq!(fetch.skip_rows, 0);
    }

    #[test]
    fn test_unbounded_page_skips_in_memory() {
        let request = Request::fetch("EmployeeDS").with_outputs("id").with_range(3, -1);
        let fetch = assemble(&request, None).unwrap();
        assert!(!fetch.query.sql.contains("LIMIT"));
        assert!(!fetch.query.sql.contains("OFFSET"));
        assert_eq!(fetch.limit, None);
        assert_eq!(fetch.skip_rows, 3);
    }

    #[test]
    fn test_page_rules() {
        assert_eq!(page(2, Some(4), None), (Some(2), 2, 0));
        assert_eq!(page(0, Some(0), None), (Some(0), 0, 0));
        assert_eq!(page(5, Some(100), Some(10)), (Some(10), 5, 0));
        assert_eq!(page(5, None, Some(10)), (Some(10), 5, 0));
        assert_eq!(page(0, None, None), (None, 0, 0));
    }

    #[test]
    fn test_where_override_with_criteria_variable() {
        let binding = OperationBinding::new(OperationType::Fetch)
            .with_where_clause("\"employee__email\" LIKE ${criteria.domain} AND ${defaultWhereClause}")
            .with_excluded_criteria(&["domain"]);
        let request = Request::fetch("EmployeeDS")
            .with_outputs("id,email")
            .with_criteria(Criteria::Map(map(json!({"domain": "%@acme.org", "id": 2}))));
        let fetch = assemble(&request, Some(&binding)).unwrap();

        assert!(fetch.query.sql.ends_with(
            "WHERE \"employee__email\" LIKE ? AND \"employee__id\" = ?"
        ));
        assert_eq!(
            fetch.query.params,
            vec![SqlValue::Text("%@acme.org".into()), SqlValue::Integer(2)]
        );
        assert_eq!(fetch.count.params, fetch.query.params);
    }

    #[test]
    fn test_table_override_replaces_default() {
        let binding = OperationBinding::new(OperationType::Fetch)
            .with_table_clause("${defaultTableClause} /* hinted */");
        let fetch = assemble(&Request::fetch("EmployeeDS").with_outputs("id"), Some(&binding)).unwrap();
        assert!(fetch.query.sql.contains("FROM \"employee\" AS \"employee\" /* hinted */"));
    }

    #[test]
    fn test_custom_sql_replaces_inner_query() {
        let binding = OperationBinding::new(OperationType::Fetch).with_custom_sql(
            "SELECT ${defaultSelectClause} FROM ${tableClause} WHERE \"employee\".\"id\" > ${criteria.minId}",
        )
        .with_excluded_criteria(&["minId"]);
        let request = Request::fetch("EmployeeDS")
            .with_outputs("id")
            .with_criteria(Criteria::Map(map(json!({"minId": 10}))));
        let fetch = assemble(&request, Some(&binding)).unwrap();
        assert_eq!(
            fetch.query.sql,
            "SELECT \"employee__id\" FROM (SELECT \"employee\".\"id\" AS \"employee__id\" \
             FROM \"employee\" AS \"employee\" WHERE \"employee\".\"id\" > ?) q"
        );
        assert_eq!(fetch.query.params, vec![SqlValue::Integer(10)]);
    }

    #[test]
    fn test_custom_sql_filters_with_default_where_clause() {
        let binding = OperationBinding::new(OperationType::Fetch).with_custom_sql(
            "SELECT ${defaultSelectClause} FROM ${defaultTableClause} ${defaultJoinClause} \
             WHERE ${defaultWhereClause}",
        );
        let request = Request::fetch("EmployeeDS")
            .with_outputs("id,city")
            .with_criteria(Criteria::Map(map(json!({"city": "Os", "id": 2}))));
        let fetch = assemble(&request, Some(&binding)).unwrap();

        let inner = "SELECT \"employee\".\"id\" AS \"employee__id\", \
                     \"employee__location_id\".\"city\" AS \"employee__location_id__city\" \
                     FROM \"employee\" AS \"employee\" \
                     LEFT OUTER JOIN \"location\" AS \"employee__location_id\" \
                     ON \"employee__location_id\".\"id\" = \"employee\".\"location_id\" \
                     WHERE (\"employee__location_id\".\"city\" LIKE ? ESCAPE '\\' \
                     AND \"employee\".\"id\" = ?)";
        assert_eq!(
            fetch.query.sql,
            format!("SELECT \"employee__id\", \"employee__location_id__city\" FROM ({inner}) q")
        );
        assert_eq!(fetch.count.sql, format!("SELECT count(*) FROM ({inner}) q"));
        assert_eq!(
            fetch.query.params,
            vec![SqlValue::Text("Os%".into()), SqlValue::Integer(2)]
        );
        assert_eq!(fetch.count.params, fetch.query.params);

        let unfiltered = assemble(&Request::fetch("EmployeeDS").with_outputs("id"), Some(&binding))
            .unwrap();
        assert!(unfiltered.query.sql.ends_with("WHERE 1 = 1) q"));
        assert!(unfiltered.query.params.is_empty());
    }

    #[test]
    fn test_insert_update_delete() {
        let registry = registry();
        let ds = registry.require("EmployeeDS").unwrap();
        let builder = MutationBuilder::new(&ds);
        let name = ds.field("name").unwrap();
        let email = ds.field("email").unwrap();

        let insert = builder
            .insert(&[
                (name, SqlValue::Text("Ann".into())),
                (email, SqlValue::Null(Some(FieldType::Text))),
            ])
            .unwrap();
        assert_eq!(
            insert.sql,
            "INSERT INTO \"employee\" (\"name\", \"email\") VALUES (?, ?) RETURNING \"id\""
        );

        let update = builder
            .update(&[(email, SqlValue::Text("a@b.c".into()))], &map(json!({"id": 2})))
            .unwrap();
        assert_eq!(update.sql, "UPDATE \"employee\" SET \"email\" = ? WHERE \"id\" = ?");
        assert_eq!(
            update.params,
            vec![SqlValue::Text("a@b.c".into()), SqlValue::Integer(2)]
        );

        let delete = builder.delete(&map(json!({"id": 2}))).unwrap();
        assert_eq!(delete.sql, "DELETE FROM \"employee\" WHERE \"id\" = ?");

        assert!(builder.delete(&IndexMap::new()).is_err());
    }
}

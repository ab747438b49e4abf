//! Criteria compilation.
//!
//! Both criteria dialects compile to the same output: a predicate fragment with
//! `?` placeholders and the parameters in placeholder order. Composite nodes
//! concatenate their children's parameters depth-first, left to right, which
//! is exactly the order their placeholders appear in the text.

use indexmap::IndexMap;
use serde_json::Value;
use sqlds_core::{
    Criteria, Criterion, FieldType, OperationBinding, SqlValue, TextMatchStyle, is_metadata_key,
};

use crate::error::QueryError;

/// Upper bound on leaf predicates in one criteria payload.
const MAX_CONDITIONS: usize = 100;

const LIKE_ESCAPE: &str = " ESCAPE '\\'";

/// A column reference a criteria field compiles against.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// SQL expression, already quoted.
    pub sql: String,
    pub field_type: Option<FieldType>,
}

/// Maps criteria field names to SQL column references.
pub trait ColumnLookup {
    fn column(&self, field: &str) -> Option<ColumnRef>;
}

/// Compiled predicate.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledCriteria {
    /// Predicate text; empty when the criteria filter nothing.
    pub sql: String,
    pub params: Vec<SqlValue>,
    /// Field names the predicate references, in first-use order.
    pub referenced_fields: Vec<String>,
}

impl CompiledCriteria {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Field names a criteria payload references, in first-use order.
///
/// Metadata keys are skipped.
pub fn collect_referenced_fields(criteria: &Criteria) -> Vec<String> {
    fn walk(node: &Criterion, out: &mut Vec<String>) {
        if let Some(name) = &node.field_name
            && !out.contains(name)
        {
            out.push(name.clone());
        }
        for child in &node.criteria {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    match criteria {
        Criteria::Map(map) => {
            for key in map.keys().filter(|k| !is_metadata_key(k)) {
                if !out.contains(key) {
                    out.push(key.clone());
                }
            }
        }
        Criteria::Tree(root) => walk(root, &mut out),
    }
    out
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

struct Fragment {
    sql: String,
    params: Vec<SqlValue>,
}

impl Fragment {
    fn bare(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    fn with_param(sql: String, param: SqlValue) -> Self {
        Self {
            sql,
            params: vec![param],
        }
    }
}

enum PatternKind {
    Contains,
    StartsWith,
    EndsWith,
}

impl PatternKind {
    fn wrap(&self, value: &str) -> String {
        let escaped = escape_like_pattern(value);
        match self {
            Self::Contains => format!("%{escaped}%"),
            Self::StartsWith => format!("{escaped}%"),
            Self::EndsWith => format!("%{escaped}"),
        }
    }
}

/// Compiles criteria against a column lookup.
pub struct CriteriaCompiler<'a> {
    data_source: &'a str,
    lookup: &'a dyn ColumnLookup,
    text_match_style: TextMatchStyle,
    binding: Option<&'a OperationBinding>,
}

impl<'a> CriteriaCompiler<'a> {
    pub fn new(data_source: &'a str, lookup: &'a dyn ColumnLookup) -> Self {
        Self {
            data_source,
            lookup,
            text_match_style: TextMatchStyle::default(),
            binding: None,
        }
    }

    #[must_use]
    pub fn with_text_match_style(mut self, style: TextMatchStyle) -> Self {
        self.text_match_style = style;
        self
    }

    /// Fields excluded by the binding are dropped instead of rejected.
    #[must_use]
    pub fn with_binding(mut self, binding: Option<&'a OperationBinding>) -> Self {
        self.binding = binding;
        self
    }

    pub fn compile(&self, criteria: &Criteria) -> Result<CompiledCriteria, QueryError> {
        let mut referenced = Vec::new();
        let mut leaves = 0usize;

        let fragment = match criteria {
            Criteria::Map(map) => self.compile_map(map, &mut referenced)?,
            Criteria::Tree(root) => self.compile_node(root, &mut referenced, &mut leaves)?,
        };

        let compiled = match fragment {
            Some(f) => CompiledCriteria {
                sql: f.sql,
                params: f.params,
                referenced_fields: referenced,
            },
            None => CompiledCriteria {
                referenced_fields: referenced,
                ..CompiledCriteria::default()
            },
        };

        tracing::trace!(
            data_source = self.data_source,
            sql = %compiled.sql,
            params = compiled.params.len(),
            "Compiled criteria"
        );
        Ok(compiled)
    }

    /// Resolves a field, or `None` when the binding excludes it.
    fn column(&self, field: &str) -> Result<Option<ColumnRef>, QueryError> {
        match self.lookup.column(field) {
            Some(col) => Ok(Some(col)),
            None if self.binding.is_some_and(|b| b.excludes(field)) => Ok(None),
            None => Err(QueryError::unknown_filter_field(self.data_source, field)),
        }
    }

    // ========================================================================
    // Flat map dialect
    // ========================================================================

    fn compile_map(
        &self,
        map: &IndexMap<String, Value>,
        referenced: &mut Vec<String>,
    ) -> Result<Option<Fragment>, QueryError> {
        if map.len() > MAX_CONDITIONS {
            return Err(QueryError::QueryTooComplex(format!(
                "Too many conditions: {} (max {MAX_CONDITIONS})",
                map.len()
            )));
        }

        let mut parts = Vec::new();
        for (name, value) in map {
            if is_metadata_key(name) {
                continue;
            }
            let Some(col) = self.column(name)? else {
                continue;
            };
            if !referenced.contains(name) {
                referenced.push(name.clone());
            }
            parts.push(self.compile_map_entry(name, &col, value)?);
        }

        Ok(join_fragments(parts, " AND "))
    }

    fn compile_map_entry(
        &self,
        name: &str,
        col: &ColumnRef,
        value: &Value,
    ) -> Result<Fragment, QueryError> {
        match value {
            Value::Null => Ok(Fragment::bare(format!("{} IS NULL", col.sql))),
            Value::Array(items) => self.in_list(name, col, items, false),
            Value::String(s) if is_textual(col.field_type) => {
                let (sql, param) = match self.text_match_style {
                    TextMatchStyle::Exact | TextMatchStyle::ExactCase => {
                        (format!("{} = ?", col.sql), s.clone())
                    }
                    TextMatchStyle::Substring => (
                        format!("{} LIKE ?{LIKE_ESCAPE}", col.sql),
                        PatternKind::Contains.wrap(s),
                    ),
                    TextMatchStyle::StartsWith => (
                        format!("{} LIKE ?{LIKE_ESCAPE}", col.sql),
                        PatternKind::StartsWith.wrap(s),
                    ),
                };
                Ok(Fragment::with_param(sql, SqlValue::Text(param)))
            }
            other => Ok(Fragment::with_param(
                format!("{} = ?", col.sql),
                typed(name, col, other)?,
            )),
        }
    }

    // ========================================================================
    // Tree dialect
    // ========================================================================

    fn compile_node(
        &self,
        node: &Criterion,
        referenced: &mut Vec<String>,
        leaves: &mut usize,
    ) -> Result<Option<Fragment>, QueryError> {
        let op = node.operator.to_ascii_lowercase();
        match op.as_str() {
            "and" | "or" | "not" => {
                if node.field_name.is_some() && node.criteria.is_empty() {
                    return Err(QueryError::MalformedCriteria(format!(
                        "'{}' node must carry sub-criteria, not a field",
                        node.operator
                    )));
                }
                let mut parts = Vec::with_capacity(node.criteria.len());
                for child in &node.criteria {
                    if let Some(fragment) = self.compile_node(child, referenced, leaves)? {
                        parts.push(fragment);
                    }
                }
                let joiner = if op == "or" { " OR " } else { " AND " };
                Ok(join_fragments(parts, joiner).map(|f| {
                    if op == "not" {
                        Fragment {
                            sql: format!("NOT ({})", f.sql),
                            params: f.params,
                        }
                    } else {
                        f
                    }
                }))
            }
            _ => {
                *leaves += 1;
                if *leaves > MAX_CONDITIONS {
                    return Err(QueryError::QueryTooComplex(format!(
                        "Too many conditions (max {MAX_CONDITIONS})"
                    )));
                }
                let name = node.field_name.as_deref().ok_or_else(|| {
                    QueryError::MalformedCriteria(format!(
                        "'{}' criterion is missing fieldName",
                        node.operator
                    ))
                })?;
                let Some(col) = self.column(name)? else {
                    return Ok(None);
                };
                if !referenced.iter().any(|r| r == name) {
                    referenced.push(name.to_string());
                }
                self.compile_leaf(&op, node, name, &col).map(Some)
            }
        }
    }

    fn compile_leaf(
        &self,
        op: &str,
        node: &Criterion,
        name: &str,
        col: &ColumnRef,
    ) -> Result<Fragment, QueryError> {
        let c = &col.sql;
        let value = node.value.as_ref().unwrap_or(&Value::Null);

        let fragment = match op {
            "notnull" | "notblank" => Fragment::bare(format!("{c} IS NOT NULL")),
            "isnull" | "isblank" => Fragment::bare(format!("{c} IS NULL")),

            "equals" if value.is_null() => Fragment::bare(format!("{c} IS NULL")),
            "equals" => Fragment::with_param(format!("{c} = ?"), typed(name, col, value)?),
            "notequal" if value.is_null() => Fragment::bare(format!("{c} IS NOT NULL")),
            "notequal" => Fragment::with_param(format!("{c} <> ?"), typed(name, col, value)?),
            "iequals" => Fragment::with_param(
                format!("LOWER({}) = LOWER(?)", as_text(col)),
                SqlValue::Text(text(name, value)?),
            ),
            "inotequal" => Fragment::with_param(
                format!("LOWER({}) <> LOWER(?)", as_text(col)),
                SqlValue::Text(text(name, value)?),
            ),

            "contains" => like(col, name, value, PatternKind::Contains, false, false)?,
            "icontains" => like(col, name, value, PatternKind::Contains, true, false)?,
            "notcontains" => like(col, name, value, PatternKind::Contains, false, true)?,
            "inotcontains" => like(col, name, value, PatternKind::Contains, true, true)?,
            "startswith" => like(col, name, value, PatternKind::StartsWith, false, false)?,
            "istartswith" => like(col, name, value, PatternKind::StartsWith, true, false)?,
            "notstartswith" => like(col, name, value, PatternKind::StartsWith, false, true)?,
            "endswith" => like(col, name, value, PatternKind::EndsWith, false, false)?,
            "iendswith" => like(col, name, value, PatternKind::EndsWith, true, false)?,
            "notendswith" => like(col, name, value, PatternKind::EndsWith, false, true)?,

            "greaterthan" => Fragment::with_param(format!("{c} > ?"), typed(name, col, value)?),
            "lessthan" => Fragment::with_param(format!("{c} < ?"), typed(name, col, value)?),
            "greaterorequal" => {
                Fragment::with_param(format!("{c} >= ?"), typed(name, col, value)?)
            }
            "lessorequal" => Fragment::with_param(format!("{c} <= ?"), typed(name, col, value)?),

            "between" => range(name, col, node, ">", "<")?,
            "betweeninclusive" => range(name, col, node, ">=", "<=")?,

            "inset" => self.in_list(name, col, array(name, value)?, false)?,
            "notinset" => self.in_list(name, col, array(name, value)?, true)?,

            _ => return Err(QueryError::UnsupportedOperator(node.operator.clone())),
        };

        Ok(fragment)
    }

    fn in_list(
        &self,
        name: &str,
        col: &ColumnRef,
        items: &[Value],
        negate: bool,
    ) -> Result<Fragment, QueryError> {
        if items.is_empty() {
            let always = if negate { "1 = 1" } else { "1 = 0" };
            return Ok(Fragment::bare(always.to_string()));
        }
        let params = items
            .iter()
            .map(|v| typed(name, col, v))
            .collect::<Result<Vec<_>, _>>()?;
        let placeholders = vec!["?"; params.len()].join(", ");
        let op = if negate { "NOT IN" } else { "IN" };
        Ok(Fragment {
            sql: format!("{} {op} ({placeholders})", col.sql),
            params,
        })
    }
}

fn join_fragments(parts: Vec<Fragment>, joiner: &str) -> Option<Fragment> {
    match parts.len() {
        0 => None,
        1 => parts.into_iter().next(),
        _ => {
            let mut sql = Vec::with_capacity(parts.len());
            let mut params = Vec::new();
            for part in parts {
                sql.push(part.sql);
                params.extend(part.params);
            }
            Some(Fragment {
                sql: format!("({})", sql.join(joiner)),
                params,
            })
        }
    }
}

fn is_textual(field_type: Option<FieldType>) -> bool {
    field_type.is_none_or(FieldType::is_textual)
}

/// Column expression usable with LIKE and LOWER.
fn as_text(col: &ColumnRef) -> String {
    if is_textual(col.field_type) {
        col.sql.clone()
    } else {
        format!("CAST({} AS TEXT)", col.sql)
    }
}

fn typed(name: &str, col: &ColumnRef, value: &Value) -> Result<SqlValue, QueryError> {
    SqlValue::from_json(value, col.field_type).map_err(|msg| QueryError::invalid_value(name, msg))
}

fn text(name: &str, value: &Value) -> Result<String, QueryError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(QueryError::invalid_value(name, "expected a text value")),
    }
}

fn array<'v>(name: &str, value: &'v Value) -> Result<&'v [Value], QueryError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(QueryError::invalid_value(name, "expected a list of values")),
    }
}

fn like(
    col: &ColumnRef,
    name: &str,
    value: &Value,
    kind: PatternKind,
    case_insensitive: bool,
    negate: bool,
) -> Result<Fragment, QueryError> {
    let pattern = kind.wrap(&text(name, value)?);
    let not = if negate { "NOT " } else { "" };
    let sql = if case_insensitive {
        format!("LOWER({}) {not}LIKE LOWER(?){LIKE_ESCAPE}", as_text(col))
    } else {
        format!("{} {not}LIKE ?{LIKE_ESCAPE}", as_text(col))
    };
    Ok(Fragment::with_param(sql, SqlValue::Text(pattern)))
}

fn range(
    name: &str,
    col: &ColumnRef,
    node: &Criterion,
    lower: &str,
    upper: &str,
) -> Result<Fragment, QueryError> {
    let mut parts = Vec::new();
    if let Some(start) = node.start.as_ref().filter(|v| !v.is_null()) {
        parts.push(Fragment::with_param(
            format!("{} {lower} ?", col.sql),
            typed(name, col, start)?,
        ));
    }
    if let Some(end) = node.end.as_ref().filter(|v| !v.is_null()) {
        parts.push(Fragment::with_param(
            format!("{} {upper} ?", col.sql),
            typed(name, col, end)?,
        ));
    }
    join_fragments(parts, " AND ").ok_or_else(|| {
        QueryError::MalformedCriteria(format!(
            "'{}' on {name} needs a start or an end",
            node.operator
        ))
    })
}

//! `${...}` interpolation for operation-binding overrides.
//!
//! Overrides are SQL text with variables. Clause variables splice in the
//! clause text together with its parameters; `${criteria.<field>}` splices a
//! `?` bound to the request's criteria value. Substitution is a single
//! left-to-right pass, so parameters come out in the order their placeholders
//! appear in the final text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use sqlds_core::{Criteria, SqlValue};

use crate::error::QueryError;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}").expect("Invalid template variable regex")
});

const CRITERIA_PREFIX: &str = "criteria.";

/// SQL text with the parameters its placeholders bind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn text(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
}

/// Variables visible to an override template.
#[derive(Debug, Default)]
pub struct TemplateContext<'a> {
    clauses: HashMap<&'static str, SqlFragment>,
    criteria: Option<&'a Criteria>,
}

impl<'a> TemplateContext<'a> {
    pub fn new(criteria: Option<&'a Criteria>) -> Self {
        Self {
            clauses: HashMap::new(),
            criteria,
        }
    }

    pub fn set(&mut self, name: &'static str, fragment: SqlFragment) {
        self.clauses.insert(name, fragment);
    }

    pub fn get(&self, name: &str) -> Option<&SqlFragment> {
        self.clauses.get(name)
    }

    /// Interpolates `template`.
    ///
    /// Unknown variables are an error. A criteria variable without a value
    /// binds NULL.
    pub fn interpolate(&self, template: &str) -> Result<SqlFragment, QueryError> {
        let mut sql = String::with_capacity(template.len());
        let mut params = Vec::new();
        let mut last = 0;

        for caps in VARIABLE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            sql.push_str(&template[last..whole.start()]);
            last = whole.end();

            let name = name.as_str();
            if let Some(field) = name.strip_prefix(CRITERIA_PREFIX) {
                let value = self
                    .criteria
                    .and_then(|c| c.value_of(field))
                    .map(|v| SqlValue::from_json(v, None))
                    .transpose()
                    .map_err(|msg| QueryError::Template(format!("${{{name}}}: {msg}")))?
                    .unwrap_or(SqlValue::Null(None));
                sql.push('?');
                params.push(value);
            } else if let Some(fragment) = self.clauses.get(name) {
                sql.push_str(&fragment.sql);
                params.extend(fragment.params.iter().cloned());
            } else {
                return Err(QueryError::Template(format!("unknown variable ${{{name}}}")));
            }
        }
        sql.push_str(&template[last..]);

        Ok(SqlFragment { sql, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interpolation_keeps_parameter_order() {
        let criteria: Criteria = serde_json::from_value(json!({"dept": 7})).unwrap();
        let mut ctx = TemplateContext::new(Some(&criteria));
        ctx.set(
            "defaultWhereClause",
            SqlFragment::new("\"name\" = ?", vec![SqlValue::Text("Ann".into())]),
        );

        let out = ctx
            .interpolate("\"dept\" = ${criteria.dept} AND (${defaultWhereClause})")
            .unwrap();
        assert_eq!(out.sql, "\"dept\" = ? AND (\"name\" = ?)");
        assert_eq!(
            out.params,
            vec![SqlValue::Integer(7), SqlValue::Text("Ann".into())]
        );
    }

    #[test]
    fn test_missing_criteria_binds_null() {
        let ctx = TemplateContext::new(None);
        let out = ctx.interpolate("x = ${criteria.y}").unwrap();
        assert_eq!(out.params, vec![SqlValue::Null(None)]);
    }

    #[test]
    fn test_unknown_variable() {
        let ctx = TemplateContext::new(None);
        assert!(matches!(
            ctx.interpolate("${whereClause}"),
            Err(QueryError::Template(_))
        ));
    }

    #[test]
    fn test_plain_text_passes_through() {
        let ctx = TemplateContext::new(None);
        let out = ctx.interpolate("employee e JOIN dept d ON d.id = e.dept_id").unwrap();
        assert_eq!(out.sql, "employee e JOIN dept d ON d.id = e.dept_id");
        assert!(out.params.is_empty());
    }
}

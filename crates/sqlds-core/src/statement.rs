//! Compiled statements.

use std::fmt;

use crate::value::SqlValue;

/// A SQL statement with `?` placeholders and its parameters in placeholder order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl BuiltQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Parameters rendered for logs and error messages.
    pub fn params_display(&self) -> String {
        let rendered: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        format!("[{}]", rendered.join(", "))
    }
}

impl fmt::Display for BuiltQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_display() {
        let query = BuiltQuery::new(
            "SELECT 1 WHERE a = ? AND b = ?",
            vec![SqlValue::Text("x".into()), SqlValue::Integer(2)],
        );
        assert_eq!(query.params_display(), "['x', 2]");
        assert_eq!(query.to_string(), "SELECT 1 WHERE a = ? AND b = ?");
    }
}

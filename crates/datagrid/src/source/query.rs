//! SQL text helpers.

use crate::value::Value;

/// Quote an identifier for SQLite.
pub(crate) fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `"table"."column"`.
pub(crate) fn qualified(table: &str, column: &str) -> String {
    format!("{}.{}", quote(table), quote(column))
}

/// Numeric-first ordering with a case-insensitive tiebreak, so "9" sorts
/// before "10" and text ties ignore case.
pub(crate) fn order_by(column: &str, desc: bool) -> String {
    let column = quote(column);
    let dir = if desc { " DESC" } else { "" };
    format!(" ORDER BY {column} + 0{dir}, {column} COLLATE NOCASE{dir}")
}

/// `?, ?, ?` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// AND-joined conditions with their bound parameters.
#[derive(Debug, Clone, Default)]
pub(crate) struct Conditions {
    parts: Vec<String>,
    params: Vec<Value>,
}

impl Conditions {
    pub fn push(&mut self, sql: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.parts.push(sql.into());
        self.params.extend(params);
    }

    /// A condition without parameters.
    pub fn push_sql(&mut self, sql: impl Into<String>) {
        self.parts.push(sql.into());
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// ` WHERE a AND b`, or an empty string without conditions.
    pub fn to_sql(&self) -> String {
        if self.parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.parts.join(" AND "))
        }
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

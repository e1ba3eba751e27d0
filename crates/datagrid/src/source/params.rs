//! Load parameters: filters, ordering, paging and tree scoping.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{GridError, Result};
use crate::value::Value;

/// Filter key that selects full-text search instead of a column.
pub const SEARCH_KEY: &str = "search";

/// Comparison operators accepted in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// `IS`: equality that also matches NULL against NULL.
    Is,
}

impl Operator {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Is => "IS",
        }
    }
}

impl FromStr for Operator {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "==" => Ok(Operator::Eq),
            "!=" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Le),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Ge),
            "is" => Ok(Operator::Is),
            other => Err(GridError::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Is => "is",
            op => op.as_sql(),
        })
    }
}

/// One WHERE condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare { op: Operator, param: Value },
    /// Inclusive `BETWEEN`.
    Range { start: Value, end: Value },
    /// Full-text search, or a LIKE over every column without a search index.
    Search(String),
}

impl Filter {
    pub fn equals(param: impl Into<Value>) -> Self {
        Filter::Compare {
            op: Operator::Eq,
            param: param.into(),
        }
    }

    pub fn compare(op: Operator, param: impl Into<Value>) -> Self {
        Filter::Compare {
            op,
            param: param.into(),
        }
    }

    pub fn range(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Filter::Range {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Parse the external `{operator, param}` shape for `column`.
    ///
    /// Unknown operators and parameters that do not fit the operator are
    /// rejected here, before any SQL is built.
    pub fn parse(column: &str, given: &FilterSpec) -> Result<Self> {
        let invalid = |reason: &str| GridError::InvalidFilter {
            column: column.to_string(),
            reason: reason.to_string(),
        };

        if column == SEARCH_KEY {
            return match &given.param {
                serde_json::Value::String(text) => Ok(Filter::Search(text.clone())),
                serde_json::Value::Null => Ok(Filter::Search(String::new())),
                serde_json::Value::Number(n) => Ok(Filter::Search(n.to_string())),
                _ => Err(invalid("search text must be a string")),
            };
        }

        let operator = given
            .operator
            .as_deref()
            .ok_or_else(|| invalid("missing operator"))?;
        if operator == "range" {
            let bounds = given
                .param
                .as_array()
                .filter(|bounds| bounds.len() == 2)
                .ok_or_else(|| invalid("range needs a two element list"))?;
            let start = Value::from_json(&bounds[0]).ok_or_else(|| invalid("range bounds must be scalars"))?;
            let end = Value::from_json(&bounds[1]).ok_or_else(|| invalid("range bounds must be scalars"))?;
            return Ok(Filter::Range { start, end });
        }

        let op = operator.parse::<Operator>()?;
        let param = Value::from_json(&given.param).ok_or_else(|| invalid("parameter must be a scalar"))?;
        Ok(Filter::Compare { op, param })
    }
}

/// Filter as it appears in JSON parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterSpec {
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub param: serde_json::Value,
}

/// Parameters of one `load()` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadParams {
    /// Conditions keyed by column name, or [`SEARCH_KEY`]; joined with AND.
    pub filters: BTreeMap<String, Filter>,
    pub order_by: Option<String>,
    pub desc: bool,
    /// Zero-based page. `None` counts as page 0.
    pub page: Option<usize>,
    /// Parent whose children are loaded in lazy tree mode; `None` for the
    /// top level.
    pub parent_id: Option<Value>,
    /// Load the flat view instead of the tree.
    pub flat: bool,
}

#[derive(Deserialize)]
struct RawParams {
    #[serde(default, rename = "where")]
    filters: BTreeMap<String, FilterSpec>,
    #[serde(default)]
    order_by: Option<String>,
    #[serde(default)]
    desc: bool,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    parent_id: serde_json::Value,
    #[serde(default)]
    flat: bool,
}

impl LoadParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the external JSON parameter shape.
    pub fn from_json(s: &str) -> Result<Self> {
        let raw: RawParams = serde_json::from_str(s)?;
        let filters: BTreeMap<String, Filter> = raw
            .filters
            .iter()
            .map(|(column, given)| Ok((column.clone(), Filter::parse(column, given)?)))
            .collect::<Result<_>>()?;
        let parent_id = match Value::from_json(&raw.parent_id) {
            Some(Value::Null) => None,
            Some(value) => Some(value),
            None => {
                return Err(GridError::InvalidFilter {
                    column: "parent_id".to_string(),
                    reason: "parent id must be a scalar".to_string(),
                });
            }
        };
        Ok(Self {
            filters,
            order_by: raw.order_by,
            desc: raw.desc,
            page: raw.page,
            parent_id,
            flat: raw.flat,
        })
    }

    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, filter: Filter) -> Self {
        self.filters.insert(column.into(), filter);
        self
    }

    #[must_use]
    pub fn with_search(self, text: impl Into<String>) -> Self {
        self.with_filter(SEARCH_KEY, Filter::Search(text.into()))
    }

    #[must_use]
    pub fn with_order_by(mut self, column: impl Into<String>, desc: bool) -> Self {
        self.order_by = Some(column.into());
        self.desc = desc;
        self
    }

    #[must_use]
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_parent_id(mut self, parent_id: impl Into<Value>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    #[must_use]
    pub fn with_flat(mut self, flat: bool) -> Self {
        self.flat = flat;
        self
    }

    /// The page number, defaulting to 0.
    #[inline]
    pub fn page(&self) -> usize {
        self.page.unwrap_or(0)
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }
}

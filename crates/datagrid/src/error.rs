//! Error types for datagrid.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::TreePath;

/// Errors raised by the data source, the tree model and configuration loading.
///
/// Data problems met while rendering a cell never surface here; those degrade
/// to a fallback value and a log line instead.
#[derive(Error, Debug)]
pub enum GridError {
    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Reading a configuration file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A TOML configuration could not be parsed.
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// A JSON configuration or filter could not be parsed.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration file has an extension other than `.toml` or `.json`.
    #[error("unsupported configuration format: {0}")]
    UnsupportedConfigFormat(PathBuf),

    /// Neither a table nor a custom query was configured.
    #[error("a table or a query is required")]
    MissingTableOrQuery,

    /// A filter named an operator that does not exist.
    #[error("invalid filter operator {0:?}")]
    InvalidOperator(String),

    /// A filter parameter does not fit its operator.
    #[error("invalid filter on {column:?}: {reason}")]
    InvalidFilter { column: String, reason: String },

    /// The table or view does not exist or has no columns.
    #[error("unknown table {0:?}")]
    UnknownTable(String),

    /// A column name is not part of the schema.
    #[error("unknown column {0:?}")]
    UnknownColumn(String),

    /// The source reads from a query and has no table to write to.
    #[error("data source has no update table")]
    ReadOnlySource,

    /// An operation needs a column role that is not configured.
    #[error("no {0} column is configured")]
    MissingRole(&'static str),

    /// The column configuration does not cover the table's columns.
    #[error("column configuration has {configured} entries but the table has {expected} configurable columns")]
    ColumnConfigMismatch { configured: usize, expected: usize },

    /// A path does not address a row.
    #[error("no row at path {0}")]
    InvalidPath(TreePath),

    /// A date string matched none of the supported formats.
    #[error("invalid date format: {0:?}")]
    InvalidDateFormat(String),
}

/// Result type for datagrid operations.
pub type Result<T> = std::result::Result<T, GridError>;

//! Column descriptors.

use serde::Deserialize;

use crate::config::{ColumnConfig, ColumnRoles};
use crate::error::{GridError, Result};

/// Expected type of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Str,
    Int,
    Long,
    Float,
    Buffer,
}

impl ColumnType {
    /// Map a declared SQLite column type.
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_ascii_uppercase().as_str() {
            "INT" | "INTEGER" | "LONG" | "BIGINT" => ColumnType::Long,
            "REAL" | "FLOAT" | "DOUBLE" => ColumnType::Float,
            "BLOB" => ColumnType::Buffer,
            _ => ColumnType::Str,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Str => "str",
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Buffer => "buffer",
        }
    }
}

/// One column of the data source, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Name in the database.
    pub name: String,
    /// Display label.
    pub display: String,
    pub column_type: ColumnType,
    /// Transform name; `None` means the string transform.
    pub transform: Option<String>,
    pub transform_options: Option<serde_json::Value>,
    pub expand: bool,
    pub visible: bool,
    /// Whether the descriptor came from explicit configuration.
    pub from_config: bool,
}

impl Column {
    pub(crate) fn introspected(name: &str, declared: &str) -> Self {
        Self {
            name: name.to_string(),
            display: name.to_string(),
            column_type: ColumnType::from_declared(declared),
            transform: None,
            transform_options: None,
            expand: false,
            visible: true,
            from_config: false,
        }
    }

    pub(crate) fn configured(name: &str, config: &ColumnConfig) -> Self {
        Self {
            name: name.to_string(),
            display: config.column.clone(),
            column_type: config.column_type,
            transform: config.encoding.clone(),
            transform_options: config.encoding_options.clone(),
            expand: config.expand,
            visible: config.visible,
            from_config: true,
        }
    }
}

/// Positions of the special columns in the column list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleIndices {
    pub id: Option<usize>,
    pub parent_id: Option<usize>,
    pub children_len: Option<usize>,
    pub flat: Option<usize>,
    pub selected: Option<usize>,
}

/// A column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableColumn {
    pub name: String,
    pub declared: String,
    pub pk: i64,
}

/// Merge table metadata with the optional configuration list.
///
/// Configuration entries are matched in order to the table columns, skipping
/// the id and selection columns.
pub(crate) fn build_columns(
    table: &[TableColumn],
    config: Option<&[ColumnConfig]>,
    roles: &ColumnRoles,
    id_column: Option<&str>,
) -> Result<(Vec<Column>, RoleIndices)> {
    let is_system = |name: &str| Some(name) == id_column || name == roles.selected;

    if let Some(config) = config {
        let expected = table.iter().filter(|c| !is_system(&c.name)).count();
        if config.len() < expected {
            return Err(GridError::ColumnConfigMismatch {
                configured: config.len(),
                expected,
            });
        }
    }

    let mut configs = config.unwrap_or_default().iter();
    let mut indices = RoleIndices::default();
    let mut columns = Vec::with_capacity(table.len());

    for (i, info) in table.iter().enumerate() {
        let name = info.name.as_str();
        if Some(name) == id_column {
            indices.id = Some(i);
        }
        if Some(name) == roles.parent_id.as_deref() {
            indices.parent_id = Some(i);
        }
        if Some(name) == roles.children_len.as_deref() {
            indices.children_len = Some(i);
        }
        if Some(name) == roles.flat.as_deref() {
            indices.flat = Some(i);
        }

        let column = if name == roles.selected {
            indices.selected = Some(i);
            Column {
                transform: Some("boolean".to_string()),
                ..Column::introspected(name, &info.declared)
            }
        } else if is_system(name) {
            Column::introspected(name, &info.declared)
        } else {
            match configs.next() {
                Some(config) => Column::configured(name, config),
                None => Column::introspected(name, &info.declared),
            }
        };
        columns.push(column);
    }

    Ok((columns, indices))
}

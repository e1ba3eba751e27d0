//! Paginated, hierarchical data sources.
//!
//! A [`DataSource`] turns [`LoadParams`] into a [`Node`] tree. The SQLite
//! implementation supports three loading strategies:
//!
//! - **flat**: one page of rows, optionally restricted to rows with a value
//!   in the flat column;
//! - **lazy tree**: the direct children of one parent, each annotated with
//!   its child count so deeper levels can be loaded on demand;
//! - **filtered tree**: every matching row together with the ancestors that
//!   connect it to the top level.

mod columns;
mod hub;
mod params;
mod query;
mod sqlite;

use std::collections::BTreeMap;
use std::sync::Arc;

use datagrid_core::Signal;

pub use columns::{Column, ColumnType, RoleIndices};
pub use hub::{ChangeHub, TableKey};
pub use params::{Filter, FilterSpec, LoadParams, Operator, SEARCH_KEY};
pub use sqlite::{
    CUSTOM_QUERY_VIEW, SqliteDataSource, SqliteDataSourceBuilder, VISIBLE_COLUMNS_TABLE, rank,
    run_quick_check,
};

use crate::error::Result;
use crate::model::Node;
use crate::value::Value;

/// Payload of a data source's `rows_changed` signal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowsChanged {
    /// New values keyed by column name.
    pub changes: BTreeMap<String, Value>,
    /// Affected row ids; `None` when every row changed.
    pub ids: Option<Vec<Value>>,
}

/// A source of rows for [`DataGridModel`](crate::DataGridModel).
///
/// Column order is fixed when the source is created; row data and the role
/// indices refer to it.
pub trait DataSource: Send + Sync {
    fn columns(&self) -> &[Column];

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Positions of the id, parent, child count, flat and selection columns.
    fn roles(&self) -> RoleIndices;

    /// Row count of the last first-page load.
    fn total_recs(&self) -> usize;

    fn page_size(&self) -> usize;

    /// Whether the id, parent and flat columns are shown.
    fn display_all(&self) -> bool;

    /// Load one page, or one tree level, as children of a fresh root node.
    fn load(&self, params: &LoadParams) -> Result<Node>;

    /// Write `changes` to the rows in `ids`, or to every row.
    fn update(&self, changes: &BTreeMap<String, Value>, ids: Option<&[Value]>) -> Result<()>;

    fn get_all_record_ids(&self, params: &LoadParams) -> Result<Vec<Value>>;

    fn get_single_record(&self, id: &Value) -> Result<Option<Vec<Value>>>;

    /// Persisted visible column names, if any were stored.
    fn get_visible_columns(&self) -> Option<Vec<String>>;

    fn set_visible_columns(&self, columns: &[String]) -> Result<()>;

    /// Emitted when another source on the same table updated rows.
    fn rows_changed(&self) -> &Arc<Signal<RowsChanged>>;
}

/// A source with no columns and no rows.
#[derive(Debug, Default)]
pub struct EmptyDataSource {
    rows_changed: Arc<Signal<RowsChanged>>,
}

impl EmptyDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataSource for EmptyDataSource {
    fn columns(&self) -> &[Column] {
        &[]
    }

    fn roles(&self) -> RoleIndices {
        RoleIndices::default()
    }

    fn total_recs(&self) -> usize {
        0
    }

    fn page_size(&self) -> usize {
        crate::config::DEFAULT_PAGE_SIZE
    }

    fn display_all(&self) -> bool {
        true
    }

    fn load(&self, _params: &LoadParams) -> Result<Node> {
        Ok(Node::root())
    }

    fn update(&self, _changes: &BTreeMap<String, Value>, _ids: Option<&[Value]>) -> Result<()> {
        Ok(())
    }

    fn get_all_record_ids(&self, _params: &LoadParams) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }

    fn get_single_record(&self, _id: &Value) -> Result<Option<Vec<Value>>> {
        Ok(None)
    }

    fn get_visible_columns(&self) -> Option<Vec<String>> {
        None
    }

    fn set_visible_columns(&self, _columns: &[String]) -> Result<()> {
        Ok(())
    }

    fn rows_changed(&self) -> &Arc<Signal<RowsChanged>> {
        &self.rows_changed
    }
}

static_assertions::assert_impl_all!(EmptyDataSource: Send, Sync);

//! Datagrid - a lazily loaded, paginated, hierarchical row store over SQLite.
//!
//! Rows come from a [`DataSource`], are materialized on demand into a tree
//! of [`Node`]s and are served to a view through the [`VirtualTree`] paths of
//! a [`DataGridModel`]. Cell values go through named transforms from a
//! [`TransformRegistry`]; image cells are rendered by the
//! [`ImageCacheManager`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use datagrid::{
//!     DataGridModel, DataSource, LoadParams, SqliteDataSource, Value, VirtualTree,
//! };
//!
//! let source = SqliteDataSource::builder("people.db").table("people").build()?;
//!
//! let rows = source.load(&LoadParams::new().with_order_by("name", false))?;
//! println!("{} of {} rows", rows.len(), source.total_recs());
//!
//! let model = DataGridModel::builder(Arc::new(source)).build();
//! model.refresh()?;
//! if let Some(path) = model.get_row_by_id(&Value::Integer(1), true) {
//!     println!("row 1 is at {path}: {:?}", model.get_value(&path, 1));
//! }
//! # Ok::<(), datagrid::GridError>(())
//! ```

pub mod config;
pub mod dateutils;
mod error;
pub mod model;
pub mod source;
pub mod stringutils;
pub mod transform;
mod value;

pub use config::{ColumnConfig, ColumnRoles, ModelConfig, SourceConfig};
pub use error::{GridError, Result};
pub use model::{
    ColumnKind, DataGridModel, DataGridModelBuilder, MediaResolver, ModelSignals, Node, RowIter,
    TreePath, VirtualTree,
};
pub use source::{
    ChangeHub, Column, ColumnType, DataSource, EmptyDataSource, Filter, FilterSpec, LoadParams,
    Operator, RoleIndices, RowsChanged, SqliteDataSource, SqliteDataSourceBuilder,
};
pub use transform::{CellValue, ImageRequest, Transform, TransformContext, TransformRegistry};
pub use value::Value;

pub use datagrid_core::{ConnectionGuard, ConnectionId, Signal};
pub use datagrid_image::{ImageCacheConfig, ImageCacheManager, ImageKey, ImageRenderer, Thumbnail};

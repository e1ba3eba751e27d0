//! The row tree and the model that serves it to views.
//!
//! # Core Types
//!
//! - [`Node`]: one row and its materialized children
//! - [`TreePath`]: position of a row as child indices from the root
//! - [`VirtualTree`]: the path-based contract a view consumes
//! - [`DataGridModel`]: lazy loading, paging, formatting and write-back over
//!   a [`DataSource`](crate::DataSource)
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────┐  load()   ┌───────────────┐  get_value()  ┌──────┐
//! │  DataSource  │──────────>│ DataGridModel │<──────────────│ View │
//! └──────────────┘           └───────────────┘               └──────┘
//!        │ rows_changed             │ data_loaded / row_inserted /
//!        └─────────────────────────>│ row_changed ──────────────────>
//! ```

mod grid_model;
mod node;
mod path;
mod traits;

pub use grid_model::{DataGridModel, DataGridModelBuilder, MediaResolver, RowIter};
pub use node::Node;
pub use path::TreePath;
pub use traits::{ColumnKind, ModelSignals, VirtualTree};

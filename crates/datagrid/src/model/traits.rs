//! The virtual tree contract consumed by a display layer.
//!
//! Iterators are [`TreePath`]s: a path identifies a row for as long as the
//! model is not refreshed, since the tree only grows between refreshes.

use datagrid_core::Signal;

use super::TreePath;
use crate::transform::CellValue;

/// What a view should use to render a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// An editable check box bound to the selection column.
    Toggle,
    /// A bitmap.
    Image,
    Text,
}

/// A lazily loaded tree exposed through paths.
///
/// Methods taking `Option<&TreePath>` treat `None` as the root, whose
/// children are the top-level rows. Touching a path loads every ancestor
/// level that is not loaded yet, and nothing else.
pub trait VirtualTree {
    fn n_columns(&self) -> usize;

    fn column_kind(&self, column: usize) -> ColumnKind;

    /// `path` itself if it addresses a row.
    fn get_iter(&self, path: &TreePath) -> Option<TreePath>;

    /// The following sibling, if the parent reports one.
    fn iter_next(&self, iter: &TreePath) -> Option<TreePath>;

    /// The first child of `parent`.
    fn iter_children(&self, parent: Option<&TreePath>) -> Option<TreePath>;

    fn iter_has_child(&self, iter: &TreePath) -> bool;

    /// Number of children of `iter`, as reported by the data source.
    fn iter_n_children(&self, iter: Option<&TreePath>) -> usize;

    fn iter_nth_child(&self, parent: Option<&TreePath>, n: usize) -> Option<TreePath>;

    /// `None` for top-level rows.
    fn iter_parent(&self, child: &TreePath) -> Option<TreePath>;

    /// The display value of one cell.
    fn get_value(&self, iter: &TreePath, column: usize) -> Option<CellValue>;

    fn signals(&self) -> &ModelSignals;
}

/// Signals emitted by a [`VirtualTree`].
pub struct ModelSignals {
    /// The root level was reloaded. Args: total record count.
    pub data_loaded: Signal<usize>,
    /// A row was appended by paging.
    pub row_inserted: Signal<TreePath>,
    /// Values of a row changed.
    pub row_changed: Signal<TreePath>,
}

impl ModelSignals {
    pub fn new() -> Self {
        Self {
            data_loaded: Signal::new(),
            row_inserted: Signal::new(),
            row_changed: Signal::new(),
        }
    }
}

impl Default for ModelSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModelSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSignals").finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(ModelSignals: Send, Sync);

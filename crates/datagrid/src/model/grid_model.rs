//! Tree model over a [`DataSource`].
//!
//! [`DataGridModel`] materializes rows on demand: the top level comes from
//! [`refresh`](DataGridModel::refresh), further pages and child levels from
//! [`add_rows`](DataGridModel::add_rows), which the [`VirtualTree`] methods
//! call implicitly whenever a path reaches into a level that is not loaded.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use datagrid::{DataGridModel, SqliteDataSource, TreePath, VirtualTree};
//!
//! let source = SqliteDataSource::builder("media.db")
//!     .table("files")
//!     .parent_column("__parent")
//!     .build()?;
//! let model = DataGridModel::builder(Arc::new(source)).build();
//! model.signals().data_loaded.connect(|total| println!("{total} records"));
//! model.refresh()?;
//!
//! // Loads the children of the first row, then reads its first child.
//! let name = model.get_value(&TreePath::from([0, 0]), 2);
//! # Ok::<(), datagrid::GridError>(())
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::NaiveDateTime;
use datagrid_core::ConnectionGuard;
use datagrid_core::logging::{span_names, targets};
use parking_lot::RwLock;

use super::traits::{ColumnKind, ModelSignals, VirtualTree};
use super::{Node, TreePath};
use crate::config::ModelConfig;
use crate::dateutils;
use crate::error::{GridError, Result};
use crate::source::{ColumnType, DataSource, Filter, LoadParams, Operator, RowsChanged, SEARCH_KEY};
use crate::transform::{
    CellValue, DEFAULT_TRANSFORM, DecodeFallback, ImageRequest, TransformContext, TransformRegistry,
};
use crate::value::Value;

/// Maps a relative media path stored in the database to a file on disk.
pub type MediaResolver = dyn Fn(&str) -> Option<PathBuf> + Send + Sync;

struct ModelState {
    rows: Node,
    /// Row id to the path of its materialized node.
    row_ids: HashMap<Value, TreePath>,
    active_params: LoadParams,
    visible_range: Option<(TreePath, TreePath)>,
    display_columns: BTreeSet<String>,
    total_recs: usize,
}

/// A lazily loaded, paginated tree of rows from a [`DataSource`].
///
/// Paths stay valid until the next [`refresh`](Self::refresh): the tree only
/// grows in between.
pub struct DataGridModel {
    source: Arc<dyn DataSource>,
    transforms: Arc<TransformRegistry>,
    config: ModelConfig,
    media_resolver: Option<Box<MediaResolver>>,
    decode_fallback: Option<Box<DecodeFallback>>,
    state: RwLock<ModelState>,
    signals: ModelSignals,
    _rows_changed: ConnectionGuard<RowsChanged>,
}

impl DataGridModel {
    pub fn builder(source: Arc<dyn DataSource>) -> DataGridModelBuilder {
        DataGridModelBuilder::new(source)
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    pub fn transforms(&self) -> &Arc<TransformRegistry> {
        &self.transforms
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Record count reported by the last refresh.
    pub fn total_recs(&self) -> usize {
        self.state.read().total_recs
    }

    pub fn active_params(&self) -> LoadParams {
        self.state.read().active_params.clone()
    }

    /// Reload the top level with the active parameters.
    ///
    /// Paging and parent scoping are reset, the row-id index is rebuilt and
    /// `data_loaded` is emitted with the new record count.
    pub fn refresh(&self) -> Result<usize> {
        let total = {
            let _span = tracing::debug_span!(target: targets::MODEL, span_names::REFRESH).entered();
            let mut state = self.state.write();
            state.active_params.page = None;
            state.active_params.parent_id = None;

            let mut rows = self.source.load(&state.active_params)?;
            rows.assign_paths(TreePath::root());

            state.row_ids.clear();
            if let Some(id_idx) = self.source.roles().id {
                index_rows(&mut state.row_ids, rows.children(), id_idx);
            }
            state.rows = rows;
            state.total_recs = self.source.total_recs();
            state.total_recs
        };
        tracing::debug!(target: targets::MODEL, total, "model refreshed");
        self.signals.data_loaded.emit(total);
        Ok(total)
    }

    /// Load more rows.
    ///
    /// With `parent` set, loads the direct children of that row. Without it,
    /// appends the next page to the top level; hierarchical data is never
    /// paged, so this returns `false` unless the model is in flat mode.
    ///
    /// Returns whether any row was added.
    pub fn add_rows(&self, parent: Option<&TreePath>) -> Result<bool> {
        let mut inserted = Vec::new();
        let added = {
            let mut state = self.state.write();
            if let Some(path) = parent
                && !self.ensure_loaded(&mut state, path.indices(), &mut inserted)?
            {
                return Err(GridError::InvalidPath(path.clone()));
            }
            self.add_rows_locked(&mut state, parent, &mut inserted)?
        };
        self.emit_inserted(inserted);
        Ok(added)
    }

    fn add_rows_locked(
        &self,
        state: &mut ModelState,
        parent: Option<&TreePath>,
        inserted: &mut Vec<TreePath>,
    ) -> Result<bool> {
        let roles = self.source.roles();
        let is_tree = roles.parent_id.is_some() && !state.active_params.flat;
        if is_tree && parent.is_none() {
            return Ok(false);
        }

        let mut params = state.active_params.clone();
        let parent_path = match parent {
            None => {
                let page = state.active_params.page() + 1;
                state.active_params.page = Some(page);
                params.page = Some(page);
                params.parent_id = None;
                TreePath::root()
            }
            Some(path) => {
                let id_idx = roles.id.ok_or(GridError::MissingRole("id"))?;
                let node = state
                    .rows
                    .descendant(path.indices())
                    .ok_or_else(|| GridError::InvalidPath(path.clone()))?;
                if node.is_children_loaded(false) {
                    return Ok(false);
                }
                params.parent_id = node.data().get(id_idx).cloned();
                path.clone()
            }
        };

        let mut loaded = self.source.load(&params)?;
        if loaded.is_empty() {
            if is_tree && let Some(node) = state.rows.descendant_mut(parent_path.indices()) {
                node.set_children_len(node.len());
            }
            return Ok(false);
        }

        let parent_node = state
            .rows
            .descendant_mut(parent_path.indices())
            .ok_or_else(|| GridError::InvalidPath(parent_path.clone()))?;
        let offset = parent_node.len();
        let count = loaded.len();
        for i in 0..count {
            if let Some(child) = loaded.get_mut(i) {
                child.assign_paths(parent_path.child(offset + i));
            }
        }
        if let Some(id_idx) = roles.id {
            index_rows(&mut state.row_ids, loaded.children(), id_idx);
        }
        parent_node.append(&mut loaded);

        if is_tree {
            // Keep the expected count in line with what the source returned,
            // or the level would be reloaded on every access.
            if parent_node.len() != parent_node.children_len() {
                tracing::debug!(
                    target: targets::MODEL,
                    path = %parent_path,
                    expected = parent_node.children_len(),
                    loaded = parent_node.len(),
                    "child count changed since the parent was loaded"
                );
                parent_node.set_children_len(parent_node.len());
            }
        } else {
            parent_node.set_children_len(parent_node.children_len() + count);
            inserted.extend((offset..offset + count).map(|i| parent_path.child(i)));
        }

        tracing::trace!(target: targets::MODEL, parent = %parent_path, count, "rows added");
        Ok(true)
    }

    /// Load every ancestor level of `indices` that is not loaded yet.
    ///
    /// Returns whether `indices` addresses a node afterwards.
    fn ensure_loaded(
        &self,
        state: &mut ModelState,
        indices: &[usize],
        inserted: &mut Vec<TreePath>,
    ) -> Result<bool> {
        for depth in 0..indices.len() {
            let prefix = &indices[..depth];
            let Some(node) = state.rows.descendant(prefix) else {
                return Ok(false);
            };
            if depth > 0 && !node.is_children_loaded(false) {
                self.add_rows_locked(state, Some(&TreePath::from(prefix)), inserted)?;
            }
        }
        Ok(state.rows.descendant(indices).is_some())
    }

    /// Run `f` on the node at `path`, loading its ancestors first.
    fn with_loaded<R>(&self, path: &TreePath, f: impl FnOnce(&Node) -> R) -> Option<R> {
        {
            let state = self.state.read();
            if !needs_loading(&state.rows, path.indices()) {
                return state.rows.descendant(path.indices()).map(f);
            }
        }

        let mut inserted = Vec::new();
        let result = {
            let mut state = self.state.write();
            match self.ensure_loaded(&mut state, path.indices(), &mut inserted) {
                Ok(true) => state.rows.descendant(path.indices()).map(f),
                Ok(false) => None,
                Err(err) => {
                    tracing::warn!(target: targets::MODEL, %path, error = %err, "failed to load rows");
                    None
                }
            }
        };
        self.emit_inserted(inserted);
        result
    }

    fn emit_inserted(&self, inserted: Vec<TreePath>) {
        for path in inserted {
            self.signals.row_inserted.emit(path);
        }
    }

    /// Call `f` with the node at `path`, loading ancestors as needed.
    pub fn with_node<F, R>(&self, path: &TreePath, f: F) -> Option<R>
    where
        F: FnOnce(&Node) -> R,
    {
        self.with_loaded(path, f)
    }

    /// Column values of the row at `path`.
    pub fn row(&self, path: &TreePath) -> Option<Vec<Value>> {
        self.with_loaded(path, |node| node.data().to_vec())
    }

    /// Depth-first, pre-order walk over the rows.
    ///
    /// Without `load_rows` only materialized rows are visited. With it, child
    /// levels and further pages are loaded as the walk reaches them, so stop
    /// early when possible.
    pub fn iter_rows(&self, load_rows: bool) -> RowIter<'_> {
        RowIter {
            model: self,
            load_rows,
            cursor: Cursor::Start,
        }
    }

    fn next_row(&self, after: Option<&TreePath>, load_rows: bool) -> Option<TreePath> {
        let mut inserted = Vec::new();
        let next = {
            let mut state = self.state.write();
            let next = match self.successor(&mut state, after, load_rows, &mut inserted) {
                Ok(next) => next,
                Err(err) => {
                    tracing::warn!(target: targets::MODEL, error = %err, "row iteration stopped");
                    None
                }
            };
            if load_rows
                && let Some(path) = &next
                && let Err(err) = self.load_children(&mut state, path, &mut inserted)
            {
                tracing::warn!(target: targets::MODEL, %path, error = %err, "failed to load children");
            }
            next
        };
        self.emit_inserted(inserted);
        next
    }

    fn load_children(
        &self,
        state: &mut ModelState,
        path: &TreePath,
        inserted: &mut Vec<TreePath>,
    ) -> Result<()> {
        let unloaded = state
            .rows
            .descendant(path.indices())
            .is_some_and(|node| !node.is_children_loaded(false));
        if unloaded {
            self.add_rows_locked(state, Some(path), inserted)?;
        }
        Ok(())
    }

    fn successor(
        &self,
        state: &mut ModelState,
        after: Option<&TreePath>,
        load_rows: bool,
        inserted: &mut Vec<TreePath>,
    ) -> Result<Option<TreePath>> {
        let Some(current) = after else {
            return self.top_level_row(state, 0, load_rows, inserted);
        };
        if state.rows.descendant(current.indices()).is_some_and(|n| !n.is_empty()) {
            return Ok(Some(current.child(0)));
        }

        let mut at = current.clone();
        loop {
            let (Some(parent), Some(index)) = (at.parent(), at.last()) else {
                return Ok(None);
            };
            if parent.is_root() {
                return self.top_level_row(state, index + 1, load_rows, inserted);
            }
            let siblings = state.rows.descendant(parent.indices()).map_or(0, Node::len);
            if index + 1 < siblings {
                return Ok(Some(parent.child(index + 1)));
            }
            at = parent;
        }
    }

    fn top_level_row(
        &self,
        state: &mut ModelState,
        index: usize,
        load_rows: bool,
        inserted: &mut Vec<TreePath>,
    ) -> Result<Option<TreePath>> {
        if index < state.rows.len() {
            return Ok(Some(TreePath::from([index])));
        }
        if load_rows && self.add_rows_locked(state, None, inserted)? && index < state.rows.len() {
            return Ok(Some(TreePath::from([index])));
        }
        Ok(None)
    }

    /// Path of the row with primary key `id`.
    ///
    /// Consults the row-id index, then walks the tree. With `load_rows` the
    /// walk loads as it goes, which loads everything when `id` is absent.
    pub fn get_row_by_id(&self, id: &Value, load_rows: bool) -> Option<TreePath> {
        let indexed = self.state.read().row_ids.get(id).cloned();
        if indexed.is_some() {
            return indexed;
        }
        for _ in self.iter_rows(load_rows) {
            let found = self.state.read().row_ids.get(id).cloned();
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// Set one cell, write it to the data source and emit `row_changed`
    /// unless `emit_event` is false.
    pub fn set_value(&self, path: &TreePath, column: usize, value: Value, emit_event: bool) -> Result<()> {
        let id_idx = self.source.roles().id.ok_or(GridError::MissingRole("id"))?;
        let name = self
            .source
            .columns()
            .get(column)
            .map(|c| c.name.clone())
            .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;

        let mut inserted = Vec::new();
        let id = {
            let mut state = self.state.write();
            if !self.ensure_loaded(&mut state, path.indices(), &mut inserted)? || path.is_root() {
                return Err(GridError::InvalidPath(path.clone()));
            }
            let node = state
                .rows
                .descendant_mut(path.indices())
                .ok_or_else(|| GridError::InvalidPath(path.clone()))?;
            let data = node.data_mut();
            if let Some(slot) = data.get_mut(column) {
                *slot = value.clone();
            }
            data.get(id_idx).cloned().unwrap_or(Value::Null)
        };
        self.emit_inserted(inserted);

        self.update_data_source(&name, value, Some(&[id]))?;
        if emit_event {
            self.signals.row_changed.emit(path.clone());
        }
        Ok(())
    }

    /// Write `column = value` to the rows in `ids`, or to every row.
    ///
    /// The loaded rows are not touched.
    pub fn update_data_source(&self, column: &str, value: Value, ids: Option<&[Value]>) -> Result<()> {
        let changes = BTreeMap::from([(column.to_string(), value)]);
        self.source.update(&changes, ids)
    }

    fn apply_rows_changed(&self, change: &RowsChanged) {
        let updates: Vec<(usize, &Value)> = change
            .changes
            .iter()
            .filter_map(|(name, value)| match self.source.column_index(name) {
                Some(idx) => Some((idx, value)),
                None => {
                    tracing::warn!(target: targets::MODEL, column = %name, "change for unknown column");
                    None
                }
            })
            .collect();

        let changed = {
            let mut state = self.state.write();
            let ModelState { rows, row_ids, .. } = &mut *state;
            let mut changed = Vec::new();
            for (id, path) in row_ids.iter() {
                if let Some(ids) = &change.ids
                    && !ids.contains(id)
                {
                    continue;
                }
                let Some(node) = rows.descendant_mut(path.indices()) else {
                    continue;
                };
                let data = node.data_mut();
                for (idx, value) in &updates {
                    if let Some(slot) = data.get_mut(*idx) {
                        *slot = (*value).clone();
                    }
                }
                changed.push(path.clone());
            }
            changed.sort();
            changed
        };

        tracing::debug!(target: targets::MODEL, rows = changed.len(), "applied external changes");
        for path in changed {
            self.signals.row_changed.emit(path);
        }
    }

    /// The display value for `value` in `column`.
    ///
    /// Never fails: a missing transform yields the raw value, and transforms
    /// fall back to string forms and placeholders.
    pub fn get_formatted_value(&self, value: &Value, column: usize, visible: bool) -> CellValue {
        let Some(col) = self.source.columns().get(column) else {
            return CellValue::Raw(value.clone());
        };
        let name = col.transform.as_deref().unwrap_or(DEFAULT_TRANSFORM);

        // Introspected types are approximate in SQLite, so only configured
        // columns are coerced.
        let mut value = if col.from_config && !value.is_null() {
            enforce_type(value.clone(), col.column_type)
        } else {
            value.clone()
        };

        let Some(transform) = self.transforms.get(name) else {
            tracing::warn!(target: targets::MODEL, transform = name, "no transform registered");
            return CellValue::Raw(value);
        };

        let mut ctx = TransformContext::new().with_visible(visible);
        match name {
            "boolean" if self.source.roles().selected == Some(column) => {
                return CellValue::Toggle(value.is_truthy());
            }
            "image" => {
                ctx = ctx.with_image(ImageRequest {
                    size: self.config.image_max_size,
                    fill: true,
                    border: self.config.image_draw_border,
                    draft: true,
                    load_on_thread: self.config.image_load_on_thread,
                });
                value = self.resolve_image(value, &mut ctx);
            }
            "string" | "html" => {
                ctx = ctx
                    .with_max_length(self.config.string_max_length)
                    .with_oneline(true);
                if let Some(fallback) = self.decode_fallback.as_deref() {
                    ctx = ctx.with_decode_fallback(fallback);
                }
            }
            _ => {}
        }
        if let Some(options) = col.transform_options.as_ref() {
            ctx = ctx.with_options(options);
        }

        transform.apply(&value, &ctx)
    }

    /// Turn a stored image value into an absolute path, or mark the cell for
    /// the placeholder.
    fn resolve_image(&self, value: Value, ctx: &mut TransformContext<'_>) -> Value {
        if !value.is_truthy() {
            return Value::Null;
        }
        let text = match value {
            Value::Text(text) => text,
            other => {
                tracing::warn!(
                    target: targets::MODEL,
                    kind = other.type_name(),
                    "image values must be file paths"
                );
                ctx.visible = false;
                return other;
            }
        };
        if !ctx.visible {
            return Value::Text(text);
        }

        let path = text
            .strip_prefix(self.config.image_prefix.as_str())
            .unwrap_or(&text);
        if path.is_empty() {
            ctx.visible = false;
            return Value::Text(text);
        }
        if Path::new(path).is_absolute() {
            return Value::Text(path.to_string());
        }
        let Some(resolver) = self.media_resolver.as_deref() else {
            tracing::warn!(
                target: targets::MODEL,
                path,
                "no media resolver configured for a relative image path"
            );
            ctx.visible = false;
            return Value::Text(text);
        };
        match resolver(path) {
            Some(full) => Value::Text(full.to_string_lossy().into_owned()),
            None => {
                ctx.visible = false;
                Value::Text(text)
            }
        }
    }

    /// Restrict image rendering to the rows in `start..=end`; `None` treats
    /// every row as visible.
    pub fn set_visible_range(&self, range: Option<(TreePath, TreePath)>) {
        self.state.write().visible_range = range;
    }

    fn is_visible(&self, path: &TreePath) -> bool {
        match &self.state.read().visible_range {
            Some((start, end)) => path.is_between(start, end),
            None => true,
        }
    }

    /// Names of columns a view should never show.
    pub fn hidden_columns(&self) -> BTreeSet<String> {
        let roles = self.source.roles();
        let flat = self.state.read().active_params.flat;
        let mut indices = vec![roles.selected];
        if !self.source.display_all() {
            indices.extend([roles.id, roles.parent_id]);
            if !flat {
                indices.push(roles.flat);
            }
        }
        let columns = self.source.columns();
        indices
            .into_iter()
            .flatten()
            .filter_map(|idx| columns.get(idx).map(|c| c.name.clone()))
            .collect()
    }

    /// Names of the columns chosen for display.
    pub fn display_columns(&self) -> BTreeSet<String> {
        self.state.read().display_columns.clone()
    }

    /// Replace and persist the displayed columns.
    pub fn set_visible_columns(&self, columns: &[String]) -> Result<()> {
        self.source.set_visible_columns(columns)?;
        self.state.write().display_columns = columns.iter().cloned().collect();
        Ok(())
    }

    /// Names of the columns rendered with a timestamp transform.
    pub fn date_columns(&self) -> Vec<String> {
        self.source
            .columns()
            .iter()
            .filter(|c| c.transform.as_deref().is_some_and(|t| t.starts_with("timestamp")))
            .map(|c| c.name.clone())
            .collect()
    }

    /// Remove the filters named in `remove`, merge `update` into the active
    /// filters and refresh.
    pub fn update_where(&self, update: BTreeMap<String, Filter>, remove: &[String]) -> Result<usize> {
        {
            let mut state = self.state.write();
            let filters = &mut state.active_params.filters;
            for key in remove {
                filters.remove(key);
            }
            filters.extend(update);
        }
        self.refresh()
    }

    /// Search every column; an empty `text` clears the search.
    pub fn set_search(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            self.update_where(BTreeMap::new(), &[SEARCH_KEY.to_string()])
        } else {
            let update = BTreeMap::from([(SEARCH_KEY.to_string(), Filter::Search(text.to_string()))]);
            self.update_where(update, &[])
        }
    }

    pub fn set_order(&self, column: Option<&str>, desc: bool) -> Result<usize> {
        {
            let mut state = self.state.write();
            state.active_params.order_by = column.map(str::to_string);
            state.active_params.desc = desc;
        }
        self.refresh()
    }

    /// Switch between the hierarchical and the flat view.
    pub fn set_flat(&self, flat: bool) -> Result<usize> {
        self.state.write().active_params.flat = flat;
        self.refresh()
    }

    /// Filter `column` to the dates in `start..=end`; either bound may be
    /// open. Filters on the other date columns are dropped.
    ///
    /// Dates are converted to the column's storage units with the inverse of
    /// its transform.
    pub fn set_date_range(
        &self,
        column: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<usize> {
        let idx = self
            .source
            .column_index(column)
            .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;
        let transform = self.source.columns()[idx]
            .transform
            .clone()
            .unwrap_or_else(|| DEFAULT_TRANSFORM.to_string());
        let to_storage = |dt: NaiveDateTime| {
            let seconds = Value::Integer(dateutils::unix_seconds(dt));
            self.transforms
                .inverse(&transform, &seconds)
                .unwrap_or(seconds)
        };

        let filter = match (start.map(&to_storage), end.map(&to_storage)) {
            (Some(start), Some(end)) => Some(Filter::Range { start, end }),
            (Some(start), None) => Some(Filter::compare(Operator::Ge, start)),
            (None, Some(end)) => Some(Filter::compare(Operator::Le, end)),
            (None, None) => None,
        };

        let mut remove = self.date_columns();
        remove.push(column.to_string());
        let update = filter
            .map(|filter| BTreeMap::from([(column.to_string(), filter)]))
            .unwrap_or_default();
        self.update_where(update, &remove)
    }
}

impl VirtualTree for DataGridModel {
    fn n_columns(&self) -> usize {
        self.source.columns().len()
    }

    fn column_kind(&self, column: usize) -> ColumnKind {
        if self.source.roles().selected == Some(column) {
            return ColumnKind::Toggle;
        }
        let transform = self
            .source
            .columns()
            .get(column)
            .and_then(|c| c.transform.as_deref());
        match transform {
            Some("image" | "boolean") => ColumnKind::Image,
            _ => ColumnKind::Text,
        }
    }

    fn get_iter(&self, path: &TreePath) -> Option<TreePath> {
        if path.is_root() {
            return None;
        }
        self.with_loaded(path, |_| path.clone())
    }

    fn iter_next(&self, iter: &TreePath) -> Option<TreePath> {
        let parent = iter.parent()?;
        let next = iter.last()? + 1;
        self.with_loaded(&parent, |node| next < node.children_len())
            .unwrap_or(false)
            .then(|| parent.child(next))
    }

    fn iter_children(&self, parent: Option<&TreePath>) -> Option<TreePath> {
        let Some(parent) = parent else {
            return (!self.state.read().rows.is_empty()).then(|| TreePath::from([0]));
        };
        self.iter_has_child(parent).then(|| parent.child(0))
    }

    fn iter_has_child(&self, iter: &TreePath) -> bool {
        self.with_loaded(iter, |node| node.children_len() > 0)
            .unwrap_or(false)
    }

    fn iter_n_children(&self, iter: Option<&TreePath>) -> usize {
        match iter {
            None => self.state.read().rows.len(),
            Some(path) => self.with_loaded(path, Node::children_len).unwrap_or(0),
        }
    }

    fn iter_nth_child(&self, parent: Option<&TreePath>, n: usize) -> Option<TreePath> {
        let parent = parent.cloned().unwrap_or_default();
        self.with_loaded(&parent, |node| n < node.children_len())
            .unwrap_or(false)
            .then(|| parent.child(n))
    }

    fn iter_parent(&self, child: &TreePath) -> Option<TreePath> {
        if child.depth() <= 1 {
            return None;
        }
        child.parent()
    }

    fn get_value(&self, iter: &TreePath, column: usize) -> Option<CellValue> {
        let visible = self.is_visible(iter);
        let raw = self.with_loaded(iter, |node| node.data().get(column).cloned())??;

        // Ids are needed verbatim to look records up.
        let roles = self.source.roles();
        if roles.id == Some(column) || roles.parent_id == Some(column) {
            return Some(CellValue::Raw(raw));
        }
        Some(self.get_formatted_value(&raw, column, visible))
    }

    fn signals(&self) -> &ModelSignals {
        &self.signals
    }
}

impl fmt::Debug for DataGridModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("DataGridModel")
            .field("columns", &self.source.columns().len())
            .field("rows", &state.rows.len())
            .field("total_recs", &state.total_recs)
            .field("active_params", &state.active_params)
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(DataGridModel: Send, Sync);

/// Builder for [`DataGridModel`].
#[must_use]
pub struct DataGridModelBuilder {
    source: Arc<dyn DataSource>,
    transforms: Option<Arc<TransformRegistry>>,
    config: ModelConfig,
    media_resolver: Option<Box<MediaResolver>>,
    decode_fallback: Option<Box<DecodeFallback>>,
}

impl DataGridModelBuilder {
    fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            transforms: None,
            config: ModelConfig::default(),
            media_resolver: None,
            decode_fallback: None,
        }
    }

    /// Share a transform registry. Defaults to a fresh
    /// [`TransformRegistry::with_defaults`].
    pub fn transforms(mut self, transforms: Arc<TransformRegistry>) -> Self {
        self.transforms = Some(transforms);
        self
    }

    pub fn config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve relative image paths.
    pub fn media_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.media_resolver = Some(Box::new(resolver));
        self
    }

    /// Decode text blobs that are not valid UTF-8.
    pub fn decode_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&[u8]) -> String + Send + Sync + 'static,
    {
        self.decode_fallback = Some(Box::new(fallback));
        self
    }

    /// Create the model. It holds no rows until [`DataGridModel::refresh`].
    pub fn build(self) -> Arc<DataGridModel> {
        let display_columns = match self.source.get_visible_columns() {
            Some(columns) => columns.into_iter().collect(),
            None => self
                .source
                .columns()
                .iter()
                .filter(|c| c.visible && !c.name.starts_with("__"))
                .map(|c| c.name.clone())
                .collect(),
        };
        let state = ModelState {
            rows: Node::root(),
            row_ids: HashMap::new(),
            active_params: LoadParams::new(),
            visible_range: None,
            display_columns,
            total_recs: 0,
        };
        let transforms = self
            .transforms
            .unwrap_or_else(|| Arc::new(TransformRegistry::with_defaults()));

        Arc::new_cyclic(|model: &Weak<DataGridModel>| {
            let model = model.clone();
            let guard = self.source.rows_changed().connect_scoped(move |change| {
                if let Some(model) = model.upgrade() {
                    model.apply_rows_changed(change);
                }
            });
            DataGridModel {
                source: self.source,
                transforms,
                config: self.config,
                media_resolver: self.media_resolver,
                decode_fallback: self.decode_fallback,
                state: RwLock::new(state),
                signals: ModelSignals::new(),
                _rows_changed: guard,
            }
        })
    }
}

/// Lazy depth-first walk returned by [`DataGridModel::iter_rows`].
pub struct RowIter<'a> {
    model: &'a DataGridModel,
    load_rows: bool,
    cursor: Cursor,
}

enum Cursor {
    Start,
    At(TreePath),
    Done,
}

impl Iterator for RowIter<'_> {
    type Item = TreePath;

    fn next(&mut self) -> Option<TreePath> {
        let next = match &self.cursor {
            Cursor::Start => self.model.next_row(None, self.load_rows),
            Cursor::At(path) => self.model.next_row(Some(path), self.load_rows),
            Cursor::Done => return None,
        };
        self.cursor = match &next {
            Some(path) => Cursor::At(path.clone()),
            None => Cursor::Done,
        };
        next
    }
}

fn index_rows(row_ids: &mut HashMap<Value, TreePath>, rows: &[Node], id_idx: usize) {
    for row in rows {
        if let (Some(id), Some(path)) = (row.data().get(id_idx), row.path()) {
            row_ids.insert(id.clone(), path.clone());
        }
        index_rows(row_ids, row.children(), id_idx);
    }
}

/// Whether reaching `indices` requires loading a level first.
fn needs_loading(rows: &Node, indices: &[usize]) -> bool {
    (1..indices.len()).any(|depth| {
        rows.descendant(&indices[..depth])
            .is_some_and(|node| !node.is_children_loaded(false))
    })
}

/// Coerce `value` to a configured column type, logging values that do not
/// convert.
fn enforce_type(value: Value, column_type: ColumnType) -> Value {
    let matches = matches!(
        (&value, column_type),
        (Value::Text(_), ColumnType::Str | ColumnType::Buffer)
            | (Value::Integer(_), ColumnType::Int | ColumnType::Long)
            | (Value::Real(_), ColumnType::Float)
            | (Value::Blob(_), ColumnType::Buffer)
    );
    if matches {
        return value;
    }

    let converted = match (&value, column_type) {
        (_, ColumnType::Str) => Some(Value::Text(value.to_string())),
        (Value::Real(f), ColumnType::Int | ColumnType::Long) if f.is_finite() => {
            Some(Value::Integer(f.trunc() as i64))
        }
        (Value::Text(s), ColumnType::Int | ColumnType::Long) => s.trim().parse().ok().map(Value::Integer),
        (Value::Integer(i), ColumnType::Float) => Some(Value::Real(*i as f64)),
        (Value::Text(s), ColumnType::Float) => s.trim().parse().ok().map(Value::Real),
        _ => None,
    };
    converted.unwrap_or_else(|| {
        tracing::warn!(
            target: targets::MODEL,
            column_type = column_type.name(),
            value = ?value,
            "could not enforce column type"
        );
        value
    })
}

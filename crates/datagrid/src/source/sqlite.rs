//! SQLite implementation of [`DataSource`].
//!
//! Connections are short lived: every operation opens its own connection,
//! registers the `rank` function and recreates the temporary view for custom
//! queries, then closes it again. Nothing SQLite related is kept between
//! calls, so a source can be shared freely between threads.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use datagrid_core::Signal;
use datagrid_core::logging::{span_names, targets};
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params_from_iter};

use crate::config::{ColumnConfig, ColumnRoles, SourceConfig};
use crate::error::{GridError, Result};
use crate::model::Node;
use crate::source::columns::{Column, RoleIndices, TableColumn, build_columns};
use crate::source::hub::{ChangeHub, TableKey};
use crate::source::params::{Filter, LoadParams, Operator};
use crate::source::query::{Conditions, order_by, placeholders, qualified, quote};
use crate::source::{DataSource, RowsChanged};
use crate::value::Value;

/// Name of the temporary view wrapping a custom query.
pub const CUSTOM_QUERY_VIEW: &str = "__CustomQueryTempView";
/// Table persisting the visible columns of each table.
pub const VISIBLE_COLUMNS_TABLE: &str = "__visible_columns";
const LEGACY_VISIBLE_COLUMNS_TABLE: &str = "_selected_columns";
/// SQLite's implicit row id, used when a table has no primary key.
const ROWID_COLUMN: &str = "_rowid_";
const SEARCH_TABLE_SUFFIX: &str = "_search";
const COUNT_ALIAS: &str = "__count";
/// Ids bound per `IN (...)` query when resolving parents.
const PARENT_BATCH: usize = 500;

/// Relevance of a full-text match, computed from `matchinfo()` output.
///
/// The blob is a sequence of native-endian `u32`s: phrase count, column
/// count, then one `(hits in row, hits in all rows, rows with hits)` triple
/// per phrase and column. The result sums the row hits of every triple whose
/// term occurs anywhere in the table.
pub fn rank(matchinfo: &[u8]) -> i64 {
    let values: Vec<u32> = matchinfo
        .chunks_exact(4)
        .map(|b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    values
        .get(2..)
        .unwrap_or_default()
        .chunks_exact(3)
        .filter(|triple| triple[1] != 0)
        .map(|triple| i64::from(triple[0]))
        .sum()
}

/// Run `PRAGMA quick_check` on a database file.
///
/// Any failure, including a file that cannot be opened, yields `false`.
pub fn run_quick_check(db_file: impl AsRef<Path>) -> bool {
    let db_file = db_file.as_ref();
    let result = Connection::open_with_flags(db_file, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .and_then(|conn| conn.query_row("PRAGMA quick_check", [], |row| row.get::<_, String>(0)));
    match result {
        Ok(status) if status == "ok" => true,
        Ok(status) => {
            tracing::warn!(
                target: targets::SOURCE,
                path = %db_file.display(),
                %status,
                "integrity check failed"
            );
            false
        }
        Err(err) => {
            tracing::warn!(
                target: targets::SOURCE,
                path = %db_file.display(),
                %err,
                "integrity check could not run"
            );
            false
        }
    }
}

fn open_connection(db_file: &Path, query: Option<&str>) -> Result<Connection> {
    let conn = Connection::open(db_file)?;
    conn.create_scalar_function(
        "rank",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let matchinfo = ctx.get::<Vec<u8>>(0)?;
            Ok(rank(&matchinfo))
        },
    )?;
    if let Some(query) = query {
        conn.execute_batch(&format!(
            "CREATE TEMP VIEW IF NOT EXISTS {} AS {query}",
            quote(CUSTOM_QUERY_VIEW)
        ))?;
    }
    Ok(conn)
}

fn table_info(conn: &Connection, table: &str) -> Result<Vec<TableColumn>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok(TableColumn {
                name: row.get(1)?,
                declared: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                pk: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
    tracing::trace!(target: targets::SOURCE, sql, "executing query");
    let mut stmt = conn.prepare(sql)?;
    let width = stmt.column_count();
    let rows = stmt
        .query_map(params_from_iter(params), |row| {
            (0..width).map(|i| row.get::<_, Value>(i)).collect::<rusqlite::Result<Vec<Value>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Rename the legacy `_selected_columns` table once.
fn migrate_visible_columns(conn: &Connection) -> Result<()> {
    let legacy: HashSet<String> = table_info(conn, LEGACY_VISIBLE_COLUMNS_TABLE)?
        .into_iter()
        .map(|c| c.name)
        .collect();
    let expected: HashSet<String> = ["tablename", "columns"].map(String::from).into();
    if legacy == expected && table_info(conn, VISIBLE_COLUMNS_TABLE)?.is_empty() {
        conn.execute_batch(&format!(
            "ALTER TABLE {} RENAME TO {}",
            quote(LEGACY_VISIBLE_COLUMNS_TABLE),
            quote(VISIBLE_COLUMNS_TABLE)
        ))?;
        tracing::info!(target: targets::SOURCE, "migrated legacy visible columns table");
    }
    Ok(())
}

/// Pick the primary key: the configured name, then the schema's primary key,
/// then the implicit rowid. Views have no rowid.
fn resolve_id_column(info: &mut Vec<TableColumn>, configured: &str, is_view: bool) -> Option<String> {
    if info.iter().any(|c| c.name == configured) {
        return Some(configured.to_string());
    }
    if is_view {
        return None;
    }
    if let Some(pk) = info.iter().find(|c| c.pk == 1) {
        return Some(pk.name.clone());
    }
    info.push(TableColumn {
        name: ROWID_COLUMN.to_string(),
        declared: "INTEGER".to_string(),
        pk: 1,
    });
    Some(ROWID_COLUMN.to_string())
}

fn sql_int(n: usize) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn children_count(value: &Value) -> usize {
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0)
}

/// Collects the rows of a filtered hierarchical load and links them up.
struct FilteredTree {
    id_idx: usize,
    parent_idx: usize,
    rows: Vec<Vec<Value>>,
    index: HashMap<Value, usize>,
}

impl FilteredTree {
    fn new(id_idx: usize, parent_idx: usize) -> Self {
        Self {
            id_idx,
            parent_idx,
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn contains(&self, id: &Value) -> bool {
        self.index.contains_key(id)
    }

    /// Add rows not seen before, keeping load order.
    fn absorb(&mut self, batch: Vec<Vec<Value>>) {
        for row in batch {
            let id = row[self.id_idx].clone();
            if !self.index.contains_key(&id) {
                self.index.insert(id, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    /// Parent ids referenced but not loaded, skipping ones known to be gone.
    fn missing_parents(&self, unresolved: &HashSet<Value>) -> Vec<Value> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .map(|row| &row[self.parent_idx])
            .filter(|parent| !parent.is_null())
            .filter(|parent| !self.index.contains_key(*parent) && !unresolved.contains(*parent))
            .filter(|parent| seen.insert(*parent))
            .cloned()
            .collect()
    }

    /// Link rows to their parents. Rows whose parent is absent become top
    /// level nodes. Every `children_len` is the number of attached children.
    fn build(self) -> Vec<Node> {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.rows.len()];
        let mut top = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            match self.index.get(&row[self.parent_idx]) {
                Some(&parent) if parent != i => children[parent].push(i),
                _ => top.push(i),
            }
        }

        let total = self.rows.len();
        let mut slots: Vec<Option<Vec<Value>>> = self.rows.into_iter().map(Some).collect();
        let nodes: Vec<Node> = top
            .into_iter()
            .filter_map(|i| Self::take_node(i, &children, &mut slots))
            .collect();

        let unreachable = slots.iter().filter(|slot| slot.is_some()).count();
        if unreachable > 0 {
            tracing::warn!(
                target: targets::SOURCE,
                unreachable,
                total,
                "rows in a parent cycle were left out of the tree"
            );
        }
        nodes
    }

    fn take_node(i: usize, children: &[Vec<usize>], slots: &mut [Option<Vec<Value>>]) -> Option<Node> {
        let mut node = Node::new(slots[i].take()?);
        for &child in &children[i] {
            if let Some(child) = Self::take_node(child, children, slots) {
                node.push(child);
            }
        }
        node.set_children_len(node.len());
        Some(node)
    }
}

/// A paginated, optionally hierarchical view of one SQLite table or query.
///
/// # Example
///
/// ```no_run
/// use datagrid::{DataSource, LoadParams, SqliteDataSource};
///
/// let source = SqliteDataSource::builder("media.db")
///     .table("files")
///     .parent_column("__parent")
///     .page_size(50)
///     .build()?;
///
/// let root = source.load(&LoadParams::new())?;
/// println!("{} of {} rows", root.len(), source.total_recs());
/// # Ok::<(), datagrid::GridError>(())
/// ```
pub struct SqliteDataSource {
    db_file: PathBuf,
    table: String,
    update_table: Option<String>,
    query: Option<String>,
    id_column: Option<String>,
    search_table: Option<String>,
    columns: Vec<Column>,
    roles: RoleIndices,
    page_size: usize,
    display_all: bool,
    persist_columns_visibility: bool,
    total_recs: AtomicUsize,
    rows_changed: Arc<Signal<RowsChanged>>,
    hub: Arc<ChangeHub>,
    hub_key: TableKey,
    hub_id: u64,
}

impl SqliteDataSource {
    pub fn builder(db_file: impl Into<PathBuf>) -> SqliteDataSourceBuilder {
        SqliteDataSourceBuilder::new(db_file)
    }

    /// Open a source registered with the process-wide [`ChangeHub`].
    pub fn from_config(config: SourceConfig) -> Result<Self> {
        Self::open(config, ChangeHub::shared())
    }

    /// Introspect the table and register with `hub`.
    ///
    /// With a `query`, rows are read from a temporary view over it and
    /// updates go to `update_table`, falling back to `table`.
    pub fn open(config: SourceConfig, hub: Arc<ChangeHub>) -> Result<Self> {
        let SourceConfig {
            db_file,
            table,
            query,
            update_table,
            columns: column_config,
            roles,
            page_size,
            ensure_selected_column,
            persist_columns_visibility,
            display_all,
        } = config;

        let update_table = update_table.or_else(|| table.clone());
        let select_table = match (&query, table) {
            (Some(query), _) => {
                tracing::debug!(target: targets::SOURCE, %query, "using custom query");
                CUSTOM_QUERY_VIEW.to_string()
            }
            (None, Some(table)) => table,
            (None, None) => return Err(GridError::MissingTableOrQuery),
        };

        let conn = open_connection(&db_file, query.as_deref())?;
        migrate_visible_columns(&conn)?;

        let mut info = table_info(&conn, &select_table)?;
        if info.is_empty() {
            return Err(GridError::UnknownTable(select_table));
        }
        let has_selected = info.iter().any(|c| c.name == roles.selected);
        if ensure_selected_column
            && !has_selected
            && let Some(target) = &update_table
        {
            conn.execute_batch(&format!(
                "ALTER TABLE {} ADD {} INTEGER",
                quote(target),
                quote(&roles.selected)
            ))?;
            tracing::debug!(
                target: targets::SOURCE,
                table = %target,
                column = %roles.selected,
                "added selection column"
            );
            info = table_info(&conn, &select_table)?;
        }

        let id_column = resolve_id_column(&mut info, &roles.id, query.is_some());
        let search_name = format!("{select_table}{SEARCH_TABLE_SUFFIX}");
        let search_table = (!table_info(&conn, &search_name)?.is_empty()).then_some(search_name);
        let (columns, role_indices) =
            build_columns(&info, column_config.as_deref(), &roles, id_column.as_deref())?;

        let rows_changed = Arc::new(Signal::new());
        let hub_key = TableKey::new(&db_file, &select_table);
        let hub_id = hub.register(hub_key.clone(), &rows_changed);

        tracing::debug!(
            target: targets::SOURCE,
            table = %select_table,
            columns = columns.len(),
            id = id_column.as_deref().unwrap_or("<none>"),
            search = search_table.is_some(),
            "opened data source"
        );

        Ok(Self {
            db_file,
            table: select_table,
            update_table,
            query,
            id_column,
            search_table,
            columns,
            roles: role_indices,
            page_size: page_size.max(1),
            display_all,
            persist_columns_visibility,
            total_recs: AtomicUsize::new(0),
            rows_changed,
            hub,
            hub_key,
            hub_id,
        })
    }

    pub fn db_file(&self) -> &Path {
        &self.db_file
    }

    /// The table or view rows are read from.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn update_table(&self) -> Option<&str> {
        self.update_table.as_deref()
    }

    /// The resolved primary key column, if any.
    pub fn id_column(&self) -> Option<&str> {
        self.id_column.as_deref()
    }

    /// The full-text index used for `search` filters.
    pub fn search_table(&self) -> Option<&str> {
        self.search_table.as_deref()
    }

    fn connect(&self) -> Result<Connection> {
        open_connection(&self.db_file, self.query.as_deref())
    }

    fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| GridError::UnknownColumn(name.to_string()))
    }

    fn require_id(&self) -> Result<&str> {
        self.id_column.as_deref().ok_or(GridError::MissingRole("id"))
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| qualified(&self.table, &c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn conditions(&self, conn: &Connection, params: &LoadParams) -> Result<Conditions> {
        let mut conditions = Conditions::default();
        for (column, filter) in &params.filters {
            match filter {
                Filter::Search(text) => self.push_search(conn, &mut conditions, text),
                Filter::Compare { op, param } => {
                    self.require_column(column)?;
                    let column = quote(column);
                    match (op, param) {
                        (Operator::Eq | Operator::Is, Value::Null) => {
                            conditions.push_sql(format!("{column} IS NULL"));
                        }
                        (Operator::Ne, Value::Null) => {
                            conditions.push_sql(format!("{column} IS NOT NULL"));
                        }
                        (op, param) => conditions.push(
                            format!("{column} {} ?", op.as_sql()),
                            [param.clone()],
                        ),
                    }
                }
                Filter::Range { start, end } => {
                    self.require_column(column)?;
                    conditions.push(
                        format!("{} BETWEEN ? AND ?", quote(column)),
                        [start.clone(), end.clone()],
                    );
                }
            }
        }
        Ok(conditions)
    }

    fn push_search(&self, conn: &Connection, conditions: &mut Conditions, text: &str) {
        if text.is_empty() {
            return;
        }
        match (&self.search_table, &self.id_column) {
            (Some(search_table), Some(id)) => {
                let (st, id) = (quote(search_table), quote(id));
                let ranked = format!(
                    "SELECT {id} FROM (SELECT rank(matchinfo({st})) AS r, {id} \
                     FROM {st} WHERE {st} MATCH ?) WHERE r > 0 ORDER BY r DESC"
                );
                match conn.prepare(&ranked).and_then(|mut stmt| stmt.exists([text])) {
                    Ok(_) => conditions.push(format!("{id} IN ({ranked})"), [Value::from(text)]),
                    Err(err) => tracing::warn!(
                        target: targets::SOURCE,
                        %search_table,
                        %err,
                        "full-text search failed, ignoring the search filter"
                    ),
                }
            }
            _ => {
                let pattern = Value::from(format!("%{text}%"));
                let likes: Vec<String> = self
                    .columns
                    .iter()
                    .map(|c| format!("{} LIKE ?", quote(&c.name)))
                    .collect();
                let n = likes.len();
                conditions.push(
                    format!("({})", likes.join(" OR ")),
                    std::iter::repeat_n(pattern, n),
                );
            }
        }
    }

    fn load_tree_rows(
        &self,
        conn: &Connection,
        conditions: &Conditions,
        order: &str,
        parent_id: Option<&Value>,
    ) -> Result<Vec<Node>> {
        if conditions.is_empty() {
            self.load_children(conn, order, parent_id)
        } else {
            self.load_filtered_tree(conn, conditions, order)
        }
    }

    /// Direct children of `parent_id`, each carrying its total child count.
    fn load_children(&self, conn: &Connection, order: &str, parent_id: Option<&Value>) -> Result<Vec<Node>> {
        let parent_idx = self.roles.parent_id.ok_or(GridError::MissingRole("parent_id"))?;
        let parent = &self.columns[parent_idx].name;

        let mut conditions = Conditions::default();
        match parent_id {
            None | Some(Value::Null) => conditions.push_sql(format!("{} IS NULL", quote(parent))),
            Some(id) => conditions.push(format!("{} = ?", quote(parent)), [id.clone()]),
        }

        let mut select = self.select_list();
        let counted = self.roles.children_len.is_none();
        if counted {
            let count = quote(COUNT_ALIAS);
            select.push_str(&format!(
                ", (SELECT COUNT(1) FROM {} AS {count} WHERE {count}.{} = {})",
                quote(&self.table),
                quote(parent),
                qualified(&self.table, self.require_id()?)
            ));
        }

        let sql = format!(
            "SELECT {select} FROM {}{}{order}",
            quote(&self.table),
            conditions.to_sql()
        );
        let nodes = query_rows(conn, &sql, conditions.params())?
            .into_iter()
            .map(|mut row| {
                let children_len = match self.roles.children_len {
                    Some(idx) if !counted => children_count(&row[idx]),
                    _ => row.pop().as_ref().map_or(0, children_count),
                };
                Node::with_children_len(row, children_len)
            })
            .collect();
        Ok(nodes)
    }

    /// Every matching row plus the ancestors needed to connect it to the top
    /// level. Parents are fetched level by level until none is missing.
    fn load_filtered_tree(&self, conn: &Connection, conditions: &Conditions, order: &str) -> Result<Vec<Node>> {
        let id_idx = self.roles.id.ok_or(GridError::MissingRole("id"))?;
        let parent_idx = self.roles.parent_id.ok_or(GridError::MissingRole("parent_id"))?;
        let id = quote(self.require_id()?);
        let table = quote(&self.table);
        let select = self.select_list();

        let mut tree = FilteredTree::new(id_idx, parent_idx);
        let sql = format!("SELECT {select} FROM {table}{}{order}", conditions.to_sql());
        tree.absorb(query_rows(conn, &sql, conditions.params())?);

        let mut unresolved = HashSet::new();
        loop {
            let missing = tree.missing_parents(&unresolved);
            if missing.is_empty() {
                break;
            }
            for batch in missing.chunks(PARENT_BATCH) {
                let sql = format!(
                    "SELECT {select} FROM {table} WHERE {id} IN ({}){order}",
                    placeholders(batch.len())
                );
                tree.absorb(query_rows(conn, &sql, batch)?);
            }
            for parent in missing {
                if !tree.contains(&parent) {
                    tracing::warn!(
                        target: targets::SOURCE,
                        %parent,
                        "parent row not found, attaching its children to the top level"
                    );
                    unresolved.insert(parent);
                }
            }
        }
        Ok(tree.build())
    }
}

impl DataSource for SqliteDataSource {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn roles(&self) -> RoleIndices {
        self.roles
    }

    fn total_recs(&self) -> usize {
        self.total_recs.load(Ordering::Relaxed)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn display_all(&self) -> bool {
        self.display_all
    }

    fn load(&self, params: &LoadParams) -> Result<Node> {
        let span = tracing::debug_span!(
            target: targets::SOURCE,
            span_names::LOAD,
            table = %self.table,
            page = params.page()
        );
        let _enter = span.enter();

        let mut root = Node::root();
        let page = params.page();
        let offset = page * self.page_size;
        if page > 0 && offset >= self.total_recs() {
            tracing::trace!(target: targets::SOURCE, offset, "past the last page");
            return Ok(root);
        }

        let conn = self.connect()?;
        let mut conditions = self.conditions(&conn, params)?;
        if params.flat {
            let flat = self.roles.flat.ok_or(GridError::MissingRole("flat"))?;
            conditions.push_sql(format!("{} IS NOT NULL", quote(&self.columns[flat].name)));
        }
        let order = match &params.order_by {
            Some(column) => {
                self.require_column(column)?;
                order_by(column, params.desc)
            }
            None => String::new(),
        };

        if page == 0 {
            let sql = format!("SELECT COUNT(1) FROM {}{}", quote(&self.table), conditions.to_sql());
            let total: i64 = conn.query_row(&sql, params_from_iter(conditions.params()), |row| row.get(0))?;
            self.total_recs
                .store(usize::try_from(total).unwrap_or(0), Ordering::Relaxed);
        }

        if self.roles.parent_id.is_some() && !params.flat {
            for node in self.load_tree_rows(&conn, &conditions, &order, params.parent_id.as_ref())? {
                root.push(node);
            }
        } else {
            let sql = format!(
                "SELECT {} FROM {}{}{order} LIMIT ? OFFSET ?",
                self.select_list(),
                quote(&self.table),
                conditions.to_sql()
            );
            let mut bound = conditions.params().to_vec();
            bound.extend([sql_int(self.page_size), sql_int(offset)]);
            for row in query_rows(&conn, &sql, &bound)? {
                root.push(Node::new(row));
            }
        }
        root.set_children_len(root.len());

        tracing::debug!(
            target: targets::SOURCE,
            rows = root.len(),
            total_recs = self.total_recs(),
            "loaded rows"
        );
        Ok(root)
    }

    fn update(&self, changes: &BTreeMap<String, Value>, ids: Option<&[Value]>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let target = self.update_table.as_deref().ok_or(GridError::ReadOnlySource)?;
        let span = tracing::debug_span!(
            target: targets::SOURCE,
            span_names::UPDATE,
            table = target,
            rows = ids.map(<[crate::value::Value]>::len)
        );
        let _enter = span.enter();

        let assignments = changes
            .keys()
            .map(|column| format!("{} = ?", quote(column)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        match ids {
            Some(ids) => {
                let sql = format!(
                    "UPDATE {} SET {assignments} WHERE {} = ?",
                    quote(target),
                    quote(self.require_id()?)
                );
                let mut stmt = tx.prepare(&sql)?;
                for id in ids {
                    stmt.execute(params_from_iter(changes.values().chain(std::iter::once(id))))?;
                }
            }
            None => {
                let sql = format!("UPDATE {} SET {assignments}", quote(target));
                tx.execute(&sql, params_from_iter(changes.values()))?;
            }
        }
        tx.commit()?;

        let change = RowsChanged {
            changes: changes.clone(),
            ids: ids.map(<[Value]>::to_vec),
        };
        self.hub.notify(self.hub_id, &self.hub_key, &change);
        Ok(())
    }

    fn get_all_record_ids(&self, params: &LoadParams) -> Result<Vec<Value>> {
        let id = quote(self.require_id()?);
        let conn = self.connect()?;
        let conditions = self.conditions(&conn, params)?;
        let sql = format!("SELECT {id} FROM {}{}", quote(&self.table), conditions.to_sql());
        Ok(query_rows(&conn, &sql, conditions.params())?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect())
    }

    fn get_single_record(&self, id: &Value) -> Result<Option<Vec<Value>>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_list(),
            quote(&self.table),
            quote(self.require_id()?)
        );
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&sql)?;
        let width = stmt.column_count();
        let row = stmt
            .query_row([id], |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })
            .optional()?;
        Ok(row)
    }

    fn get_visible_columns(&self) -> Option<Vec<String>> {
        if !self.persist_columns_visibility {
            return None;
        }
        let stored = self.connect().and_then(|conn| {
            if table_info(&conn, VISIBLE_COLUMNS_TABLE)?.is_empty() {
                return Ok(None);
            }
            let sql = format!(
                "SELECT columns FROM {} WHERE tablename = ?",
                quote(VISIBLE_COLUMNS_TABLE)
            );
            Ok(conn
                .query_row(&sql, [&self.table], |row| row.get::<_, Option<String>>(0))
                .optional()?
                .flatten())
        });
        match stored {
            Ok(columns) => columns.map(|columns| {
                columns
                    .split(',')
                    .filter(|name| !name.is_empty())
                    .map(String::from)
                    .collect()
            }),
            Err(err) => {
                tracing::warn!(target: targets::SOURCE, %err, "could not read visible columns");
                None
            }
        }
    }

    fn set_visible_columns(&self, columns: &[String]) -> Result<()> {
        if !self.persist_columns_visibility {
            return Ok(());
        }
        let joined = columns
            .iter()
            .filter(|name| !name.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let conn = self.connect()?;
        let table = quote(VISIBLE_COLUMNS_TABLE);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (tablename TEXT PRIMARY KEY, columns TEXT)"
        ))?;
        conn.execute(
            &format!("INSERT OR REPLACE INTO {table} (tablename, columns) VALUES (?, ?)"),
            [self.table.as_str(), joined.as_str()],
        )?;
        Ok(())
    }

    fn rows_changed(&self) -> &Arc<Signal<RowsChanged>> {
        &self.rows_changed
    }
}

impl Drop for SqliteDataSource {
    fn drop(&mut self) {
        self.hub.unregister(self.hub_id);
    }
}

impl fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("db_file", &self.db_file)
            .field("table", &self.table)
            .field("update_table", &self.update_table)
            .field("id_column", &self.id_column)
            .field("columns", &self.columns.len())
            .field("total_recs", &self.total_recs())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(SqliteDataSource: Send, Sync);

/// Fluent construction of a [`SqliteDataSource`].
#[must_use]
pub struct SqliteDataSourceBuilder {
    config: SourceConfig,
    hub: Option<Arc<ChangeHub>>,
}

impl SqliteDataSourceBuilder {
    fn new(db_file: impl Into<PathBuf>) -> Self {
        Self {
            config: SourceConfig::new(db_file),
            hub: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = Some(table.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.config.query = Some(query.into());
        self
    }

    pub fn update_table(mut self, table: impl Into<String>) -> Self {
        self.config.update_table = Some(table.into());
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnConfig>) -> Self {
        self.config.columns = Some(columns);
        self
    }

    pub fn roles(mut self, roles: ColumnRoles) -> Self {
        self.config.roles = roles;
        self
    }

    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.config.roles.id = name.into();
        self
    }

    pub fn parent_column(mut self, name: impl Into<String>) -> Self {
        self.config.roles.parent_id = Some(name.into());
        self
    }

    pub fn children_len_column(mut self, name: impl Into<String>) -> Self {
        self.config.roles.children_len = Some(name.into());
        self
    }

    pub fn flat_column(mut self, name: impl Into<String>) -> Self {
        self.config.roles.flat = Some(name.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn ensure_selected_column(mut self, ensure: bool) -> Self {
        self.config.ensure_selected_column = ensure;
        self
    }

    pub fn persist_columns_visibility(mut self, persist: bool) -> Self {
        self.config.persist_columns_visibility = persist;
        self
    }

    pub fn display_all(mut self, display_all: bool) -> Self {
        self.config.display_all = display_all;
        self
    }

    /// Notify through `hub` instead of the process-wide hub.
    pub fn hub(mut self, hub: Arc<ChangeHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn build(self) -> Result<SqliteDataSource> {
        let hub = self.hub.unwrap_or_else(ChangeHub::shared);
        SqliteDataSource::open(self.config, hub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matchinfo(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    #[test]
    fn test_rank_sums_row_hits_of_present_terms() {
        // 1 phrase, 2 columns: (3 hits, 5 total), (2 hits, 0 total)
        let blob = matchinfo(&[1, 2, 3, 5, 1, 2, 0, 0]);
        assert_eq!(rank(&blob), 3);

        let blob = matchinfo(&[1, 2, 3, 5, 1, 2, 4, 1]);
        assert_eq!(rank(&blob), 5);
    }

    #[test]
    fn test_rank_of_short_blob_is_zero() {
        assert_eq!(rank(&[]), 0);
        assert_eq!(rank(&matchinfo(&[1])), 0);
        assert_eq!(rank(&[1, 2, 3]), 0);
    }

    fn row(id: i64, parent: Option<i64>) -> Vec<Value> {
        vec![Value::Integer(id), Value::from(parent)]
    }

    #[test]
    fn test_filtered_tree_links_and_counts() {
        let mut tree = FilteredTree::new(0, 1);
        tree.absorb(vec![row(4, Some(2)), row(5, Some(2))]);
        assert_eq!(tree.missing_parents(&HashSet::new()), vec![Value::Integer(2)]);

        tree.absorb(vec![row(2, None), row(4, Some(2))]);
        assert!(tree.missing_parents(&HashSet::new()).is_empty());

        let nodes = tree.build();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].data()[0], Value::Integer(2));
        assert_eq!(nodes[0].children_len(), 2);
        assert!(nodes[0].is_children_loaded(true));
    }

    #[test]
    fn test_orphans_go_to_top_level() {
        let mut tree = FilteredTree::new(0, 1);
        tree.absorb(vec![row(7, Some(99)), row(8, None)]);
        let mut unresolved = HashSet::new();
        unresolved.insert(Value::Integer(99));
        assert!(tree.missing_parents(&unresolved).is_empty());

        let nodes = tree.build();
        let ids: Vec<_> = nodes.iter().map(|n| n.data()[0].clone()).collect();
        assert_eq!(ids, vec![Value::Integer(7), Value::Integer(8)]);
    }

    #[test]
    fn test_cycles_are_dropped() {
        let mut tree = FilteredTree::new(0, 1);
        tree.absorb(vec![row(1, Some(2)), row(2, Some(1)), row(3, None)]);
        let nodes = tree.build();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].data()[0], Value::Integer(3));
    }

    #[test]
    fn test_rowid_fallback() {
        let mut info = vec![TableColumn {
            name: "name".to_string(),
            declared: "TEXT".to_string(),
            pk: 0,
        }];
        assert_eq!(resolve_id_column(&mut info, "rowid", true), None);
        assert_eq!(resolve_id_column(&mut info, "rowid", false).as_deref(), Some("_rowid_"));
        assert_eq!(info.len(), 2);
        assert_eq!(resolve_id_column(&mut info, "name", false).as_deref(), Some("name"));
    }
}

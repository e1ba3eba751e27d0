//! Tests for the SQLite data source against real database files.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use datagrid::{
    ChangeHub, ColumnType, DataSource, Filter, GridError, LoadParams, Node, Operator,
    SqliteDataSource, Value,
    source::{VISIBLE_COLUMNS_TABLE, run_quick_check},
};
use parking_lot::Mutex;
use rusqlite::Connection;

use common::{files, files_db, files_source, init_tracing, people, people_db, people_source};

fn names(nodes: &Node, column: usize) -> Vec<String> {
    nodes
        .iter()
        .map(|n| n.data()[column].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_load_first_page_and_total() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let rows = source.load(&LoadParams::new()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.children_len(), 2);
    assert_eq!(source.total_recs(), 3);
    assert_eq!(source.columns().len(), 7);
    assert_eq!(source.roles().id, Some(people::ID));
    assert_eq!(source.roles().selected, Some(people::SELECTED));
}

#[test]
fn test_load_paging() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    source.load(&LoadParams::new()).unwrap();
    let rows = source.load(&LoadParams::new().with_page(1)).unwrap();
    assert_eq!(names(&rows, people::LAST_NAME), ["Goldman"]);

    let rows = source.load(&LoadParams::new().with_page(2)).unwrap();
    assert!(rows.is_empty());
    assert_eq!(source.total_recs(), 3);
}

#[test]
fn test_total_is_counted_on_first_page_only() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    let source = people_source(&db_file, &ChangeHub::new());

    assert_eq!(source.load(&LoadParams::new()).unwrap().len(), 2);
    assert_eq!(source.total_recs(), 3);

    let conn = Connection::open(&db_file).unwrap();
    conn.execute("DELETE FROM people WHERE __viaextract_id = 3", []).unwrap();

    // Later pages reuse the first page's count.
    assert!(source.load(&LoadParams::new().with_page(1)).unwrap().is_empty());
    assert_eq!(source.total_recs(), 3);

    // Past the end nothing touches the database.
    conn.execute_batch("DROP TABLE people").unwrap();
    assert!(source.load(&LoadParams::new().with_page(2)).unwrap().is_empty());
    assert_eq!(source.total_recs(), 3);
    assert!(source.load(&LoadParams::new().with_page(1)).is_err());
}

#[test]
fn test_load_with_filter_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let params = LoadParams::from_json(
        r#"{"where": {"age": {"param": 30, "operator": ">"}}, "order_by": "age", "desc": true}"#,
    )
    .unwrap();
    let rows = source.load(&params).unwrap();
    assert_eq!(names(&rows, people::LAST_NAME), ["Goldman", "Austin"]);
    assert_eq!(source.total_recs(), 2);

    let params = LoadParams::new().with_filter("age", Filter::range(30, 35));
    assert_eq!(source.load(&params).unwrap().len(), 2);

    let params = LoadParams::new().with_filter("image_path", Filter::compare(Operator::Is, Value::Null));
    assert_eq!(names(&source.load(&params).unwrap(), people::LAST_NAME), ["Goldman"]);
}

#[test]
fn test_unknown_filter_column_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let params = LoadParams::new().with_filter("salary", Filter::equals(1));
    assert!(matches!(source.load(&params), Err(GridError::UnknownColumn(c)) if c == "salary"));

    let params = LoadParams::new().with_order_by("salary", false);
    assert!(matches!(source.load(&params), Err(GridError::UnknownColumn(_))));

    assert!(matches!(
        LoadParams::from_json(r#"{"where": {"age": {"param": 1, "operator": "~"}}}"#),
        Err(GridError::InvalidOperator(op)) if op == "~"
    ));
}

#[test]
fn test_update_and_notify_other_sources() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    let hub = ChangeHub::new();
    let source = people_source(&db_file, &hub);
    let other = people_source(&db_file, &hub);
    assert_eq!(hub.live_sources(), 2);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    other
        .rows_changed()
        .connect(move |change| sink.lock().push(change.clone()));
    let own = Arc::new(Mutex::new(0));
    let counter = own.clone();
    source.rows_changed().connect(move |_| *counter.lock() += 1);

    let changes = BTreeMap::from([("__selected".to_string(), Value::from(true))]);
    source.update(&changes, Some(&[Value::Integer(1)])).unwrap();

    let rows = source.load(&LoadParams::new()).unwrap();
    assert_eq!(rows.children()[0].data()[people::SELECTED], Value::Integer(1));
    assert_eq!(rows.children()[1].data()[people::SELECTED], Value::Null);

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].ids, Some(vec![Value::Integer(1)]));
    assert_eq!(received[0].changes["__selected"], Value::Integer(1));
    assert_eq!(*own.lock(), 0);
}

#[test]
fn test_update_all_rows() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let changes = BTreeMap::from([("age".to_string(), Value::Integer(40))]);
    source.update(&changes, None).unwrap();
    let params = LoadParams::new().with_filter("age", Filter::equals(40));
    assert_eq!(source.get_all_record_ids(&params).unwrap().len(), 3);
}

#[test]
fn test_dropped_source_leaves_hub() {
    let dir = tempfile::tempdir().unwrap();
    let hub = ChangeHub::new();
    let source = people_source(&people_db(dir.path()), &hub);
    assert_eq!(hub.live_sources(), 1);
    drop(source);
    assert_eq!(hub.live_sources(), 0);
}

#[test]
fn test_get_all_record_ids() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let params = LoadParams::new().with_filter("age", Filter::compare(Operator::Gt, 30));
    assert_eq!(
        source.get_all_record_ids(&params).unwrap(),
        [Value::Integer(2), Value::Integer(3)]
    );
}

#[test]
fn test_get_single_record() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let row = source.get_single_record(&Value::Integer(1)).unwrap().unwrap();
    assert_eq!(row[people::FIRST_NAME], Value::from("Dee"));
    assert_eq!(row[people::LAST_NAME], Value::from("Timberlake"));
    assert_eq!(source.get_single_record(&Value::Integer(42)).unwrap(), None);
}

#[test]
fn test_configured_columns() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());

    let columns = source.columns();
    assert_eq!(columns[people::AGE].display, "Age");
    assert_eq!(columns[people::AGE].column_type, ColumnType::Int);
    assert!(columns[people::AGE].from_config);
    assert_eq!(columns[people::START].transform.as_deref(), Some("datetime"));
    assert_eq!(columns[people::SELECTED].transform.as_deref(), Some("boolean"));
    assert!(!columns[people::ID].from_config);
}

#[test]
fn test_column_config_must_cover_table() {
    let dir = tempfile::tempdir().unwrap();
    let result = SqliteDataSource::builder(people_db(dir.path()))
        .table("people")
        .id_column("__viaextract_id")
        .columns(common::people_columns()[..3].to_vec())
        .build();
    assert!(matches!(
        result,
        Err(GridError::ColumnConfigMismatch { configured: 3, expected: 5 })
    ));
}

#[test]
fn test_missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    assert!(matches!(
        SqliteDataSource::builder(&db_file).table("nope").build(),
        Err(GridError::UnknownTable(t)) if t == "nope"
    ));
    assert!(matches!(
        SqliteDataSource::builder(&db_file).build(),
        Err(GridError::MissingTableOrQuery)
    ));
}

#[test]
fn test_rowid_fallback_without_primary_key() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteDataSource::builder(people_db(dir.path()))
        .table("people")
        .hub(ChangeHub::new())
        .build()
        .unwrap();
    assert_eq!(source.id_column(), Some("_rowid_"));

    let rows = source.load(&LoadParams::new()).unwrap();
    let last = source.columns().len() - 1;
    assert_eq!(rows.children()[0].data()[last], Value::Integer(1));
}

#[test]
fn test_like_search_without_index() {
    let dir = tempfile::tempdir().unwrap();
    let source = people_source(&people_db(dir.path()), &ChangeHub::new());
    assert_eq!(source.search_table(), None);

    let rows = source.load(&LoadParams::new().with_search("timber")).unwrap();
    assert_eq!(names(&rows, people::FIRST_NAME), ["Dee"]);

    let rows = source.load(&LoadParams::new().with_search("")).unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_full_text_search() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    {
        let conn = Connection::open(&db_file).unwrap();
        conn.execute_batch(
            "CREATE VIRTUAL TABLE people_search USING fts4(__viaextract_id, first_name, last_name);
             INSERT INTO people_search SELECT __viaextract_id, first_name, last_name FROM people;",
        )
        .unwrap();
    }
    let source = people_source(&db_file, &ChangeHub::new());
    assert_eq!(source.search_table(), Some("people_search"));

    let rows = source.load(&LoadParams::new().with_search("austin")).unwrap();
    assert_eq!(names(&rows, people::LAST_NAME), ["Austin"]);
    assert_eq!(source.total_recs(), 1);

    let rows = source.load(&LoadParams::new().with_search("nobody")).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn test_custom_query_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let source = SqliteDataSource::builder(people_db(dir.path()))
        .query("SELECT first_name, age FROM people WHERE age > 30")
        .hub(ChangeHub::new())
        .build()
        .unwrap();
    assert_eq!(source.table(), datagrid::source::CUSTOM_QUERY_VIEW);
    assert_eq!(source.id_column(), None);

    let rows = source.load(&LoadParams::new()).unwrap();
    assert_eq!(names(&rows, 0), ["Steve", "Oscar"]);

    let changes = BTreeMap::from([("age".to_string(), Value::Integer(1))]);
    assert!(matches!(source.update(&changes, None), Err(GridError::ReadOnlySource)));
}

#[test]
fn test_visible_columns_are_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    let source = people_source(&db_file, &ChangeHub::new());
    assert_eq!(source.get_visible_columns(), None);

    source.set_visible_columns(&["last_name".to_string()]).unwrap();
    assert_eq!(source.get_visible_columns(), Some(vec!["last_name".to_string()]));

    let reopened = people_source(&db_file, &ChangeHub::new());
    assert_eq!(reopened.get_visible_columns(), Some(vec!["last_name".to_string()]));
}

#[test]
fn test_legacy_visible_columns_are_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = people_db(dir.path());
    {
        let conn = Connection::open(&db_file).unwrap();
        conn.execute_batch(
            "CREATE TABLE _selected_columns (tablename TEXT, columns TEXT);
             INSERT INTO _selected_columns VALUES ('people', 'first_name,age');",
        )
        .unwrap();
    }

    let source = people_source(&db_file, &ChangeHub::new());
    assert_eq!(
        source.get_visible_columns(),
        Some(vec!["first_name".to_string(), "age".to_string()])
    );

    let conn = Connection::open(&db_file).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE name = ?",
            [VISIBLE_COLUMNS_TABLE],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}

#[test]
fn test_quick_check() {
    let dir = tempfile::tempdir().unwrap();
    assert!(run_quick_check(people_db(dir.path())));

    let garbage = dir.path().join("garbage.db");
    std::fs::write(&garbage, b"this is not a database, just some text padding it out").unwrap();
    assert!(!run_quick_check(&garbage));
    assert!(!run_quick_check(dir.path().join("missing.db")));
}

#[test]
fn test_lazy_tree_levels() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let source = files_source(&files_db(dir.path()), &ChangeHub::new());

    let root = source.load(&LoadParams::new()).unwrap();
    assert_eq!(names(&root, files::NAME), ["file-0", "file-1", "folder-0", "folder-1"]);
    let counts: Vec<usize> = root.iter().map(Node::children_len).collect();
    assert_eq!(counts, [0, 0, 2, 3]);
    assert!(!root.is_children_loaded(true));
    assert_eq!(source.total_recs(), 10);

    let folder = &root.children()[3];
    let params = LoadParams::new().with_parent_id(folder.data()[files::ID].clone());
    let children = source.load(&params).unwrap();
    assert_eq!(names(&children, files::NAME), ["file-1-0", "file-1-1", "folder-1-0"]);
    assert_eq!(children.children()[2].children_len(), 1);
    assert!(children.children()[2].children().is_empty());
}

#[test]
fn test_filtered_tree_keeps_ancestors() {
    let dir = tempfile::tempdir().unwrap();
    let source = files_source(&files_db(dir.path()), &ChangeHub::new());

    let params = LoadParams::new().with_filter("name", Filter::equals("file-1-0-0"));
    let root = source.load(&params).unwrap();
    assert_eq!(names(&root, files::NAME), ["folder-1"]);
    assert_eq!(source.total_recs(), 1);

    let folder = &root.children()[0];
    assert_eq!(folder.children_len(), 1);
    let inner = &folder.children()[0];
    assert_eq!(inner.data()[files::NAME], Value::from("folder-1-0"));
    assert_eq!(inner.children_len(), 1);
    assert_eq!(inner.children()[0].data()[files::NAME], Value::from("file-1-0-0"));
    assert!(root.is_children_loaded(true));
}

#[test]
fn test_flat_view() {
    let dir = tempfile::tempdir().unwrap();
    let source = files_source(&files_db(dir.path()), &ChangeHub::new());

    let root = source.load(&LoadParams::new().with_flat(true)).unwrap();
    assert_eq!(root.len(), 7);
    assert_eq!(source.total_recs(), 7);
    assert!(root.iter().all(|n| n.children_len() == 0));
    assert!(root.iter().all(|n| !n.data()[files::FLAT].is_null()));
    assert!(root.iter().any(|n| n.data()[files::PARENT] == Value::Integer(9)));
}

#[test]
fn test_stored_child_counts() {
    let dir = tempfile::tempdir().unwrap();
    let db_file = files_db(dir.path());
    {
        let conn = Connection::open(&db_file).unwrap();
        conn.execute_batch(
            "ALTER TABLE files ADD __children INTEGER;
             UPDATE files SET __children = (SELECT COUNT(1) FROM files AS c WHERE c.__parent = files.id);",
        )
        .unwrap();
    }
    let source = SqliteDataSource::builder(&db_file)
        .table("files")
        .parent_column("__parent")
        .children_len_column("__children")
        .hub(ChangeHub::new())
        .build()
        .unwrap();

    let root = source.load(&LoadParams::new()).unwrap();
    let counts: Vec<usize> = root.iter().map(Node::children_len).collect();
    assert_eq!(counts, [0, 0, 2, 3]);
    assert_eq!(root.children()[0].data().len(), source.columns().len());
}

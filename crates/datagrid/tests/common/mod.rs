//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use datagrid::{ChangeHub, ColumnConfig, ColumnType, SqliteDataSource};
use rusqlite::{Connection, params};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Column positions in the `people` table once opened.
pub mod people {
    pub const ID: usize = 0;
    pub const FIRST_NAME: usize = 1;
    pub const LAST_NAME: usize = 2;
    pub const AGE: usize = 3;
    pub const START: usize = 4;
    pub const IMAGE: usize = 5;
    pub const SELECTED: usize = 6;
}

/// Column positions in the `files` table once opened.
pub mod files {
    pub const ID: usize = 0;
    pub const NAME: usize = 1;
    pub const SIZE: usize = 2;
    pub const PARENT: usize = 3;
    pub const FLAT: usize = 4;
    pub const SELECTED: usize = 5;
}

/// Three people; the first has an absolute image path, the second a
/// relative one and the third none.
pub fn people_db(dir: &Path) -> PathBuf {
    let db_file = dir.join("people.db");
    let conn = Connection::open(&db_file).unwrap();
    conn.execute_batch(
        "CREATE TABLE people (
            __viaextract_id INTEGER,
            first_name TEXT,
            last_name TEXT,
            age INTEGER,
            start_date INTEGER,
            image_path TEXT
        )",
    )
    .unwrap();
    let absolute = format!("file://{}", dir.join("image.png").display());
    let rows: [(i64, &str, &str, i64, i64, Option<&str>); 3] = [
        (1, "Dee", "Timberlake", 30, 1_286_755_200, Some(absolute.as_str())),
        (2, "Steve", "Austin", 35, 1_318_291_200, Some("file://icons/calendar22.png")),
        (3, "Oscar", "Goldman", 50, 1_349_913_600, None),
    ];
    for row in rows {
        conn.execute(
            "INSERT INTO people VALUES (?, ?, ?, ?, ?, ?)",
            params![row.0, row.1, row.2, row.3, row.4, row.5],
        )
        .unwrap();
    }
    db_file
}

pub fn people_columns() -> Vec<ColumnConfig> {
    vec![
        ColumnConfig::new("First name", ColumnType::Str),
        ColumnConfig::new("Last name", ColumnType::Str),
        ColumnConfig::new("Age", ColumnType::Int),
        ColumnConfig::new("Start", ColumnType::Int).with_encoding("datetime"),
        ColumnConfig::new("Image", ColumnType::Str).with_encoding("image"),
    ]
}

pub fn people_source(db_file: &Path, hub: &Arc<ChangeHub>) -> SqliteDataSource {
    SqliteDataSource::builder(db_file)
        .table("people")
        .id_column("__viaextract_id")
        .columns(people_columns())
        .page_size(2)
        .hub(hub.clone())
        .build()
        .unwrap()
}

/// ```text
/// file-0
/// file-1
/// folder-0
///   file-0-0
///   file-0-1
/// folder-1
///   file-1-0
///   file-1-1
///   folder-1-0
///     file-1-0-0
/// ```
///
/// Files have a `flat` marker, folders do not.
pub fn files_db(dir: &Path) -> PathBuf {
    let db_file = dir.join("files.db");
    let conn = Connection::open(&db_file).unwrap();
    conn.execute_batch(
        "CREATE TABLE files (
            id INTEGER PRIMARY KEY,
            name TEXT,
            size INTEGER,
            __parent INTEGER,
            flat INTEGER
        )",
    )
    .unwrap();
    let rows: [(i64, &str, Option<i64>); 10] = [
        (1, "file-0", None),
        (2, "file-1", None),
        (3, "folder-0", None),
        (4, "folder-1", None),
        (5, "file-0-0", Some(3)),
        (6, "file-0-1", Some(3)),
        (7, "file-1-0", Some(4)),
        (8, "file-1-1", Some(4)),
        (9, "folder-1-0", Some(4)),
        (10, "file-1-0-0", Some(9)),
    ];
    for (id, name, parent) in rows {
        let is_file = name.starts_with("file");
        conn.execute(
            "INSERT INTO files VALUES (?, ?, ?, ?, ?)",
            params![id, name, id * 1024, parent, is_file.then_some(1)],
        )
        .unwrap();
    }
    db_file
}

pub fn files_source(db_file: &Path, hub: &Arc<ChangeHub>) -> SqliteDataSource {
    SqliteDataSource::builder(db_file)
        .table("files")
        .parent_column("__parent")
        .flat_column("flat")
        .hub(hub.clone())
        .build()
        .unwrap()
}

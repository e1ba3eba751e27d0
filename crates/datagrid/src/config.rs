//! Configuration types.
//!
//! [`SourceConfig`] describes a SQLite data source and can be read from a TOML
//! or JSON file; [`ModelConfig`] holds the tree model's display settings.
//!
//! ```toml
//! db_file = "media.db"
//! table = "files"
//! page_size = 50
//!
//! [roles]
//! parent_id = "__parent"
//! children_len = "children_len"
//!
//! [[columns]]
//! column = "Name"
//! type = "str"
//!
//! [[columns]]
//! column = "Modified"
//! type = "long"
//! encoding = "timestamp_ms"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{GridError, Result};
use crate::source::ColumnType;

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Default name of the primary-key column.
pub const ID_COLUMN: &str = "rowid";
/// Default name of the row selection column.
pub const SELECTED_COLUMN: &str = "__selected";

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Display settings for one table column, matched to the table positionally.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnConfig {
    /// Display label.
    pub column: String,
    /// Expected value type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Transform name.
    #[serde(default)]
    pub encoding: Option<String>,
    /// Options passed to the transform.
    #[serde(default)]
    pub encoding_options: Option<serde_json::Value>,
    #[serde(default)]
    pub expand: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl ColumnConfig {
    pub fn new(column: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            column: column.into(),
            column_type,
            encoding: None,
            encoding_options: None,
            expand: false,
            visible: true,
        }
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    #[must_use]
    pub fn with_encoding_options(mut self, options: serde_json::Value) -> Self {
        self.encoding_options = Some(options);
        self
    }

    #[must_use]
    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Names of the columns with a special meaning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ColumnRoles {
    /// Primary key. Falls back to the schema's primary key, then to the rowid.
    pub id: String,
    /// Parent row id; enables hierarchical loading.
    pub parent_id: Option<String>,
    /// Stored child count; when absent the count is computed by a subquery.
    pub children_len: Option<String>,
    /// Rows with a non-null value here make up the flat view.
    pub flat: Option<String>,
    /// Boolean selection marker.
    pub selected: String,
}

impl Default for ColumnRoles {
    fn default() -> Self {
        Self {
            id: ID_COLUMN.to_string(),
            parent_id: None,
            children_len: None,
            flat: None,
            selected: SELECTED_COLUMN.to_string(),
        }
    }
}

/// Everything needed to open a [`SqliteDataSource`](crate::SqliteDataSource).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub db_file: PathBuf,
    /// Table to read. Also the update target unless `update_table` is set.
    #[serde(default)]
    pub table: Option<String>,
    /// Arbitrary SELECT to read from instead of `table`.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub update_table: Option<String>,
    #[serde(default)]
    pub columns: Option<Vec<ColumnConfig>>,
    #[serde(default)]
    pub roles: ColumnRoles,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Add the selection column with ALTER TABLE when it is missing.
    #[serde(default = "default_true")]
    pub ensure_selected_column: bool,
    #[serde(default = "default_true")]
    pub persist_columns_visibility: bool,
    /// Show the id, parent and flat columns too.
    #[serde(default)]
    pub display_all: bool,
}

impl SourceConfig {
    pub fn new(db_file: impl Into<PathBuf>) -> Self {
        Self {
            db_file: db_file.into(),
            table: None,
            query: None,
            update_table: None,
            columns: None,
            roles: ColumnRoles::default(),
            page_size: DEFAULT_PAGE_SIZE,
            ensure_selected_column: true,
            persist_columns_visibility: true,
            display_all: false,
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a `.toml` or `.json` configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GridError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&text),
            Some("json") => Self::from_json_str(&text),
            _ => Err(GridError::UnsupportedConfigFormat(path.to_path_buf())),
        }
    }
}

/// Display settings for [`DataGridModel`](crate::DataGridModel).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Edge length of image thumbnails. Default: 24.
    pub image_max_size: u32,
    /// Draw a border and shadow around thumbnails. Default: false.
    pub image_draw_border: bool,
    /// Render thumbnails on the background thread. Default: true.
    pub image_load_on_thread: bool,
    /// Text cells are cut after this many characters. Default: 100.
    pub string_max_length: usize,
    /// Prefix stripped from image paths. Default: `file://`.
    pub image_prefix: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            image_max_size: 24,
            image_draw_border: false,
            image_load_on_thread: true,
            string_max_length: 100,
            image_prefix: "file://".to_string(),
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn with_image_max_size(mut self, size: u32) -> Self {
        self.image_max_size = size;
        self
    }

    #[must_use]
    pub fn with_image_draw_border(mut self, border: bool) -> Self {
        self.image_draw_border = border;
        self
    }

    #[must_use]
    pub fn with_image_load_on_thread(mut self, on_thread: bool) -> Self {
        self.image_load_on_thread = on_thread;
        self
    }

    #[must_use]
    pub fn with_string_max_length(mut self, max_length: usize) -> Self {
        self.string_max_length = max_length;
        self
    }
}

//! Logging targets and span names for datagrid.
//!
//! datagrid uses the `tracing` crate for instrumentation. To see logs, install
//! a subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("datagrid::source=debug,datagrid::image_cache=trace")
//!     .init();
//! ```

/// Span names used for the expensive operations.
///
/// These constants can be used to filter traces for specific subsystems.
pub mod span_names {
    /// A data source `load()` call.
    pub const LOAD: &str = "datagrid::load";
    /// A data source `update()` call.
    pub const UPDATE: &str = "datagrid::update";
    /// A tree model refresh.
    pub const REFRESH: &str = "datagrid::refresh";
    /// Rendering one thumbnail.
    pub const RENDER: &str = "datagrid::render";
}

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "datagrid_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "datagrid_core::signal";
    /// SQL data source target.
    pub const SOURCE: &str = "datagrid::source";
    /// Tree model adapter target.
    pub const MODEL: &str = "datagrid::model";
    /// Value transform registry target.
    pub const TRANSFORM: &str = "datagrid::transform";
    /// Image cache manager target.
    pub const IMAGE_CACHE: &str = "datagrid::image_cache";
}

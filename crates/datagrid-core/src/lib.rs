//! Core primitives shared by the datagrid crates.
//!
//! - **Signal/Slot System**: type-safe notification between the data source,
//!   the tree model, the image cache and whatever UI layer sits on top
//! - **Logging**: `tracing` target and span names for filtering
//!
//! # Example
//!
//! ```
//! use datagrid_core::Signal;
//!
//! let data_loaded = Signal::<usize>::new();
//! data_loaded.connect(|total| println!("{total} records"));
//! data_loaded.emit(3);
//! ```

pub mod logging;
mod signal;

pub use signal::{ConnectionGuard, ConnectionId, Signal};

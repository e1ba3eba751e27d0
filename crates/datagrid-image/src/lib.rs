//! Thumbnail cache for datagrid image columns.
//!
//! - [`ImageCacheManager`]: bounded LRU cache with a LIFO background render
//!   thread and placeholder substitution while loading
//! - [`ImageRenderer`]: the rendering seam; [`ThumbnailRenderer`] is the
//!   default implementation built on the `image` crate
//! - [`MediaKind`]: picks the placeholder for a file

mod error;
mod image_cache;
mod media;
mod render;

pub use error::{ImageError, ImageResult};
pub use image_cache::{CacheStats, ImageCacheConfig, ImageCacheManager};
pub use media::MediaKind;
pub use render::{ImageKey, ImageRenderer, Thumbnail, ThumbnailRenderer};

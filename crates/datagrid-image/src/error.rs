//! Error types for the image crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while rendering or caching thumbnails.
#[derive(Error, Debug)]
pub enum ImageError {
    /// The image file could not be decoded.
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The key has no path and the renderer cannot produce a placeholder for it.
    #[error("no image path given")]
    MissingPath,

    /// The background render thread could not be started.
    #[error("failed to spawn image worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

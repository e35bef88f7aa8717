use std::path::PathBuf;

use thiserror::Error;

/// Why a resource, document or page could not be produced.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {src}: {source}")]
    Io {
        src: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {src}: {source}")]
    Decode {
        src: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to open document {src}: {reason}")]
    Open { src: String, reason: String },

    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    #[error("failed to rasterize page {page}: {reason}")]
    Rasterize { page: usize, reason: String },

    #[error("unsupported resource: {0}")]
    Unsupported(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Problems reading a [`crate::config::ViewerConfig`] from disk.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

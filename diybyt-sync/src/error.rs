//! Error types for diybyt-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from fingerprinting, packaging, or transfer.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip encoding or decoding failed.
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// An archive member would land outside the extraction root.
    #[error("archive entry '{name}' escapes the extraction root")]
    UnsafeEntry { name: String },

    /// Network failure talking to the render host.
    #[error("transfer failed: {0}")]
    Transfer(#[from] reqwest::Error),

    /// The render host answered but did not apply the upload.
    #[error("render host rejected update (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The file watcher could not be set up.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// JSON encoding/decoding of a protocol payload.
    #[error("protocol JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking worker task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Join(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the render host: snapshot application, orchestration,
/// and the HTTP listener.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] diybyt_core::ConfigError),

    #[error("render error: {0}")]
    Render(#[from] diybyt_renderer::RenderError),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] diybyt_sync::SyncError),

    #[error("blocking task failed: {0}")]
    Join(String),

    #[error("server error: {0}")]
    Server(String),
}

impl DaemonError {
    /// Whether the error stems from the uploaded bytes rather than the host.
    pub fn is_bad_upload(&self) -> bool {
        use diybyt_sync::SyncError;
        matches!(
            self,
            DaemonError::Snapshot(SyncError::Archive(_) | SyncError::UnsafeEntry { .. })
        )
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

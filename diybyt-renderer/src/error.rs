//! Error types for diybyt-renderer.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors that can arise while rendering or publishing a slot.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer binary could not be started.
    #[error("failed to spawn renderer {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The renderer ran but exited unsuccessfully.
    #[error("render of {program} failed (exit code {code:?}): {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The renderer did not finish within the configured limit.
    #[error("render of {program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    /// The renderer reported success but wrote nothing.
    #[error("renderer produced no output at {path}")]
    MissingOutput { path: PathBuf },

    /// Filesystem error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

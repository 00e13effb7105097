//! Error types for diybyt-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while reading the program metadata document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with the path that was being read.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The metadata document did not exist in the program directory.
    #[error("program metadata not found at {path}")]
    MetadataNotFound { path: PathBuf },

    /// The document is not valid JSON, or its top level is not an object.
    #[error("failed to parse program metadata at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A single program entry has the wrong shape.
    #[error("invalid entry for program '{name}': {source}")]
    InvalidProgram {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

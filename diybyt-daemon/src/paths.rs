//! On-disk layout of the render host.
//!
//! ```text
//! <data_dir>/
//!   star_programs_cache/   extracted program snapshot (read by reconcile)
//!   gifs/                  slot<N>.gif, served under /gifs
//!   temp/                  private render output and upload scratch
//! ```

use std::path::{Path, PathBuf};

use crate::error::{io_err, DaemonError};

pub const CACHE_DIR: &str = "star_programs_cache";
pub const GIF_DIR: &str = "gifs";
pub const TEMP_DIR: &str = "temp";

const STAGING_SUFFIX: &str = ".staging";
const RETIRED_SUFFIX: &str = ".old";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }

    pub fn gif_dir(&self) -> PathBuf {
        self.root.join(GIF_DIR)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(TEMP_DIR)
    }

    /// Where an upload is extracted before it replaces the cache.
    pub fn staging_dir(&self) -> PathBuf {
        self.root.join(format!("{CACHE_DIR}{STAGING_SUFFIX}"))
    }

    /// Where the previous cache sits while the staging dir is renamed in.
    pub fn retired_dir(&self) -> PathBuf {
        self.root.join(format!("{CACHE_DIR}{RETIRED_SUFFIX}"))
    }

    /// Create the cache, gif, and temp directories.
    pub fn ensure(&self) -> Result<(), DaemonError> {
        for dir in [self.cache_dir(), self.gif_dir(), self.temp_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        }
        Ok(())
    }
}

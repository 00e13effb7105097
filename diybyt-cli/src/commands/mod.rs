pub mod push;
pub mod serve;
pub mod slots;
pub mod status;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_PROGRAM_DIR: &str = "./star_programs";

/// Multi-threaded runtime for the async subcommands.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

/// Program directory as an absolute path.
pub fn program_dir(dir: PathBuf) -> PathBuf {
    diybyt_sync::service::absolute_root(&dir)
}

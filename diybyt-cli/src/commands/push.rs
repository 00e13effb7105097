//! `diybyt push`: one hash-gated upload.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use diybyt_sync::service::resolve_server_url;
use diybyt_sync::{SyncClient, SyncOutcome};

use super::{program_dir, runtime, DEFAULT_PROGRAM_DIR};

/// Arguments for `diybyt push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Program directory to upload.
    #[arg(long, env = "STAR_PROGRAMS_PATH", default_value = DEFAULT_PROGRAM_DIR)]
    pub dir: PathBuf,

    /// Render host URL; defaults to `_config.render_server_url`.
    #[arg(long, env = "RENDER_SERVER_URL")]
    pub server: Option<String>,
}

impl PushArgs {
    pub fn run(self) -> Result<()> {
        let root = program_dir(self.dir);
        let server = resolve_server_url(self.server.as_deref(), &root);
        let mut client = SyncClient::http(&root, &server).context("failed to build HTTP client")?;

        let outcome = runtime()?
            .block_on(client.check_and_sync())
            .with_context(|| format!("failed to push {} to {server}", root.display()))?;

        match outcome {
            SyncOutcome::Transferred { hash, files, bytes } => println!(
                "{} {files} files ({bytes} bytes) to {server} [{}]",
                "pushed".green().bold(),
                hash.short(),
            ),
            SyncOutcome::Unchanged { hash } => {
                println!("{} [{}]", "unchanged".bright_black(), hash.short())
            }
        }
        Ok(())
    }
}

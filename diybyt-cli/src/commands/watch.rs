//! `diybyt watch`: keep the render host in sync with a program directory.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast;

use diybyt_sync::debounce::QUIET_WINDOW;
use diybyt_sync::service::{self, resolve_server_url, ServiceOptions};
use diybyt_sync::{ChangeDebouncer, SyncClient};

use super::{program_dir, runtime, DEFAULT_PROGRAM_DIR};

/// Arguments for `diybyt watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Program directory to watch.
    #[arg(long, env = "STAR_PROGRAMS_PATH", default_value = DEFAULT_PROGRAM_DIR)]
    pub dir: PathBuf,

    /// Render host URL; defaults to `_config.render_server_url`.
    #[arg(long, env = "RENDER_SERVER_URL")]
    pub server: Option<String>,

    /// Seconds between fallback checks.
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = 30)]
    pub interval: u64,

    /// Quiet period in milliseconds after the last change.
    #[arg(long, default_value_t = QUIET_WINDOW.as_millis() as u64)]
    pub debounce_ms: u64,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let root = program_dir(self.dir);
        let server = resolve_server_url(self.server.as_deref(), &root);
        let client = SyncClient::http(&root, &server).context("failed to build HTTP client")?;
        let options = ServiceOptions {
            poll_interval: Duration::from_secs(self.interval.max(1)),
            debounce: ChangeDebouncer::new(Duration::from_millis(self.debounce_ms)),
        };

        tracing::info!(
            path = %root.display(),
            server = %server,
            interval_secs = options.poll_interval.as_secs(),
            "starting sync service",
        );

        runtime()?.block_on(async move {
            let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received ctrl-c, stopping sync service");
                }
                let _ = shutdown_tx.send(());
            });
            service::run(client, options, shutdown_rx)
                .await
                .context("sync service failed")
        })?;
        Ok(())
    }
}

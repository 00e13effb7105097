//! `diybyt serve`: run the render host in the foreground.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use diybyt_daemon::{start_blocking, HostOptions, DEFAULT_BIND};
use diybyt_renderer::engine::{DEFAULT_PIXLET_BIN, DEFAULT_RENDER_TIMEOUT};

/// Arguments for `diybyt serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "DIYBYT_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Directory holding star_programs_cache/, gifs/ and temp/.
    #[arg(long, env = "DIYBYT_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// pixlet executable.
    #[arg(long = "pixlet", env = "PIXLET_BIN", default_value = DEFAULT_PIXLET_BIN)]
    pub pixlet_bin: PathBuf,

    /// Seconds before a single render is abandoned.
    #[arg(long, default_value_t = DEFAULT_RENDER_TIMEOUT.as_secs())]
    pub render_timeout: u64,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let options = HostOptions {
            bind: self.bind,
            data_dir: self.data_dir,
            pixlet_bin: self.pixlet_bin,
            render_timeout: std::time::Duration::from_secs(self.render_timeout),
        };
        start_blocking(options).context("render host exited with error")
    }
}

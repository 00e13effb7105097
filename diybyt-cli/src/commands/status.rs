//! `diybyt status`: ask a running render host what it is doing.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use diybyt_daemon::HostStatus;
use diybyt_sync::protocol::fetch_status;
use diybyt_sync::service::resolve_server_url;

use super::{program_dir, runtime, DEFAULT_PROGRAM_DIR};

/// Arguments for `diybyt status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Render host URL; defaults to `_config.render_server_url` in `--dir`.
    #[arg(long, env = "RENDER_SERVER_URL")]
    pub server: Option<String>,

    /// Program directory consulted for the default server URL.
    #[arg(long, env = "STAR_PROGRAMS_PATH", default_value = DEFAULT_PROGRAM_DIR)]
    pub dir: PathBuf,

    /// Emit the raw status JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct LoopTableRow {
    #[tabled(rename = "slot")]
    slot: usize,
    #[tabled(rename = "program")]
    program: String,
    #[tabled(rename = "state")]
    state: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let server = resolve_server_url(self.server.as_deref(), &program_dir(self.dir));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;

        let raw = runtime()?
            .block_on(fetch_status(&http, &server))
            .with_context(|| format!("render host at {server} did not answer"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&raw).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        let status: HostStatus =
            serde_json::from_value(raw).context("unexpected status document")?;
        print_status(&server, status);
        Ok(())
    }
}

fn print_status(server: &str, status: HostStatus) {
    let last = status
        .last_reconcile
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{} | generation {} | last reconcile {last}",
        server.bold(),
        status.generation,
    );

    if status.loops.is_empty() {
        println!("No render loops running.");
        return;
    }

    let rows: Vec<LoopTableRow> = status
        .loops
        .into_iter()
        .map(|l| LoopTableRow {
            slot: l.slot,
            program: l.program,
            state: if l.alive {
                "running".green().to_string()
            } else {
                "stopped".red().to_string()
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

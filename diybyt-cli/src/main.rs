//! DIYbyt: render host and program sync for LED matrix displays.
//!
//! # Usage
//!
//! ```text
//! diybyt serve [--bind 0.0.0.0:8000] [--data-dir .] [--pixlet pixlet]
//! diybyt watch [--dir ./star_programs] [--server URL] [--interval 30]
//! diybyt push  [--dir ./star_programs] [--server URL]
//! diybyt slots [--dir ./star_programs] [--json]
//! diybyt status [--server URL] [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    push::PushArgs, serve::ServeArgs, slots::SlotsArgs, status::StatusArgs, watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "diybyt",
    version,
    about = "Render pixlet programs into display slots and keep them in sync",
    long_about = None,
)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. debug, info, warn).
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the render host: upload endpoint, slot files, render loops.
    Serve(ServeArgs),

    /// Watch a program directory and push changes to the render host.
    Watch(WatchArgs),

    /// Push the program directory once if it changed.
    Push(PushArgs),

    /// Show the slot each enabled program would occupy.
    Slots(SlotsArgs),

    /// Query a running render host.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    diybyt_daemon::init_tracing(cli.log_level.as_deref());
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Watch(args) => args.run(),
        Commands::Push(args) => args.run(),
        Commands::Slots(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

//! `diybyt slots`: preview slot numbering for a program directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use diybyt_core::{metadata, slot_file_name, ProgramConfig, ProgramMetadata, SlotAssigner};

use super::{program_dir, DEFAULT_PROGRAM_DIR};

/// Arguments for `diybyt slots`.
#[derive(Args, Debug)]
pub struct SlotsArgs {
    /// Program directory holding program_metadata.json.
    #[arg(long, env = "STAR_PROGRAMS_PATH", default_value = DEFAULT_PROGRAM_DIR)]
    pub dir: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Serialize)]
struct SlotRow {
    slot: usize,
    file: String,
    program: String,
    refresh_secs: f64,
    duration: String,
    order: i64,
}

#[derive(Debug, Serialize)]
struct SlotsReport {
    render_server_url: String,
    slots: Vec<SlotRow>,
    missing: Vec<String>,
}

#[derive(Tabled)]
struct SlotTableRow {
    #[tabled(rename = "slot")]
    slot: String,
    #[tabled(rename = "program")]
    program: String,
    #[tabled(rename = "refresh")]
    refresh: String,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "order")]
    order: i64,
}

impl SlotsArgs {
    pub fn run(self) -> Result<()> {
        let dir = program_dir(self.dir);
        let metadata = metadata::load_at(&dir)
            .with_context(|| format!("failed to load program metadata from {}", dir.display()))?;
        let report = build_report(&dir, &metadata);

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize slots JSON")?
            );
            return Ok(());
        }
        print_table(report);
        Ok(())
    }
}

fn build_report(dir: &Path, metadata: &ProgramMetadata) -> SlotsReport {
    let (present, missing): (Vec<&ProgramConfig>, Vec<&ProgramConfig>) = metadata
        .enabled()
        .partition(|program| program.source_path(dir).is_file());
    let assignment = SlotAssigner::assign(present.iter().map(|p| &p.name));

    let slots = present
        .iter()
        .zip(assignment.iter())
        .map(|(program, (_, slot))| SlotRow {
            slot,
            file: slot_file_name(slot),
            program: program.name.to_string(),
            refresh_secs: program.refresh_interval().as_secs_f64(),
            duration: format!("{} {}", program.duration, program.duration_unit),
            order: program.order,
        })
        .collect();

    SlotsReport {
        render_server_url: metadata.settings.render_server_url.clone(),
        slots,
        missing: missing.iter().map(|p| p.name.to_string()).collect(),
    }
}

fn print_table(report: SlotsReport) {
    println!(
        "{} slots | render server {}",
        report.slots.len(),
        report.render_server_url.bold(),
    );

    if report.slots.is_empty() {
        println!("No enabled programs.");
    } else {
        let rows: Vec<SlotTableRow> = report
            .slots
            .into_iter()
            .map(|row| SlotTableRow {
                slot: row.file,
                program: row.program,
                refresh: format!("{}s", row.refresh_secs),
                duration: row.duration,
                order: row.order,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for name in report.missing {
        println!("{} {name} is enabled but its file is missing", "skipped".yellow().bold());
    }
}

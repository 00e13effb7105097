//! Task orchestrator: owns every live [`RenderTaskHandle`].
//!
//! ## Reconcile
//!
//! 1. Cancel every tracked loop (no waiting) and drop the handles.
//! 2. Keep enabled programs whose source exists in the cache, in document
//!    order; missing sources are skipped with a warning and take no slot.
//! 3. Assign slots positionally and claim them for a fresh generation.
//! 4. Spawn one [`RenderLoop`] per assigned program.
//!
//! Loops cancelled in step 1 may still be inside a publish; the generation
//! claim in step 3 makes their output a no-op.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use diybyt_core::{metadata, ProgramConfig, ProgramMetadata, ProgramName, SlotAssigner, SlotAssignment};
use diybyt_renderer::{Generation, LoopSettings, RenderLoop, RenderTaskHandle, Renderer, SlotTable};

use crate::error::DaemonError;

/// What one reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub generation: Generation,
    pub assignment: SlotAssignment,
    /// Enabled programs left out because their source file is missing.
    pub skipped: Vec<ProgramName>,
}

/// One row of the host status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatus {
    pub program: String,
    pub slot: usize,
    pub alive: bool,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    pub generation: Generation,
    pub last_reconcile: Option<DateTime<Utc>>,
    pub loops: Vec<LoopStatus>,
}

pub struct TaskOrchestrator<R: Renderer> {
    renderer: Arc<R>,
    slots: Arc<SlotTable>,
    cache_dir: PathBuf,
    temp_dir: PathBuf,
    generation: Generation,
    handles: Vec<RenderTaskHandle>,
    last_reconcile: Option<DateTime<Utc>>,
}

impl<R: Renderer> TaskOrchestrator<R> {
    pub fn new(
        renderer: Arc<R>,
        slots: Arc<SlotTable>,
        cache_dir: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            renderer,
            slots,
            cache_dir: cache_dir.into(),
            temp_dir: temp_dir.into(),
            generation: 0,
            handles: Vec::new(),
            last_reconcile: None,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn active(&self) -> &[RenderTaskHandle] {
        &self.handles
    }

    pub fn slots(&self) -> &Arc<SlotTable> {
        &self.slots
    }

    /// Replace every running loop with the set `metadata` describes.
    pub async fn reconcile(
        &mut self,
        metadata: &ProgramMetadata,
    ) -> Result<ReconcileReport, DaemonError> {
        for handle in self.handles.drain(..) {
            handle.cancel();
        }

        let mut runnable: Vec<&ProgramConfig> = Vec::new();
        let mut skipped = Vec::new();
        for program in metadata.enabled() {
            let source = program.source_path(&self.cache_dir);
            if source.is_file() {
                runnable.push(program);
            } else {
                tracing::warn!(
                    program = %program.name,
                    path = %source.display(),
                    "program file not found, skipping",
                );
                skipped.push(program.name.clone());
            }
        }

        let assignment = SlotAssigner::assign(runnable.iter().map(|p| &p.name));
        self.generation += 1;
        let generation = self.generation;
        self.slots.claim(generation, assignment.len()).await?;

        for (program, (_, slot)) in runnable.iter().zip(assignment.iter()) {
            let settings = LoopSettings {
                program: program.name.clone(),
                source: program.source_path(&self.cache_dir),
                params: program.render_params(),
                slot,
                generation,
                refresh: program.refresh_interval(),
                temp_dir: self.temp_dir.clone(),
            };
            tracing::info!(program = %program.name, slot, generation, "started task for program");
            let render_loop = RenderLoop::new(settings, self.renderer.clone(), self.slots.clone());
            self.handles.push(render_loop.spawn());
        }

        self.last_reconcile = Some(Utc::now());
        tracing::info!(
            generation,
            active = self.handles.len(),
            skipped = skipped.len(),
            "reconciled render tasks",
        );
        Ok(ReconcileReport {
            generation,
            assignment,
            skipped,
        })
    }

    /// Reconcile against the metadata document in the program cache.
    ///
    /// A missing or malformed document runs zero loops; a single unreadable
    /// entry only drops that program.
    pub async fn reconcile_from_cache(&mut self) -> Result<ReconcileReport, DaemonError> {
        let metadata = match metadata::load_at(&self.cache_dir) {
            Ok(metadata) => metadata,
            Err(err) => {
                tracing::warn!(error = %err, "no usable program metadata; running no programs");
                ProgramMetadata::default()
            }
        };
        self.reconcile(&metadata).await
    }

    /// Cancel every loop and wait for all of them to exit.
    pub async fn shutdown(&mut self) {
        let handles: Vec<_> = self.handles.drain(..).collect();
        for handle in &handles {
            handle.cancel();
        }
        for handle in handles {
            let program = handle.program.clone();
            if let Some(stats) = handle.shutdown().await {
                tracing::debug!(
                    program = %program,
                    published = stats.published,
                    failures = stats.failures,
                    "render task stopped",
                );
            }
        }
    }

    pub fn status(&self) -> HostStatus {
        HostStatus {
            generation: self.generation,
            last_reconcile: self.last_reconcile,
            loops: self
                .handles
                .iter()
                .map(|handle| LoopStatus {
                    program: handle.program.to_string(),
                    slot: handle.slot,
                    alive: handle.is_alive(),
                })
                .collect(),
        }
    }
}

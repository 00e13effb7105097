//! Per-program render loop.
//!
//! ```text
//!   Rendering ──ok──▶ Publishing ──ok──▶ Sleeping ──▶ Rendering …
//!       │                 │
//!       └──err──▶ Retrying ◀──err
//!                    │ (fixed 5 s backoff, unbounded)
//!                    └──────────▶ Rendering
//! ```
//!
//! Cancellation is observed at every suspension point except publishing,
//! which always runs to completion; [`SlotTable`] generation checks keep a
//! cancelled loop from clobbering its successor.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use diybyt_core::ProgramName;

use crate::engine::{RenderJob, Renderer};
use crate::error::RenderError;
use crate::publish::{Generation, PublishOutcome, SlotTable};

/// Wait after any failure before rendering again.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Floor on the inter-cycle sleep, even when a cycle overran its interval.
pub const MIN_CYCLE_SLEEP: Duration = Duration::from_millis(100);

/// Everything a loop needs to know about its program and slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub program: ProgramName,
    pub source: PathBuf,
    pub params: Vec<(String, String)>,
    pub slot: usize,
    pub generation: Generation,
    pub refresh: Duration,
    /// Directory for the loop's private render output.
    pub temp_dir: PathBuf,
}

impl LoopSettings {
    /// `<temp_dir>/<program>.<generation>.slot<N>.gif`. Generation and slot
    /// together are unique per loop, so neither a cancelled predecessor nor
    /// a program whose flattened name collides can share the file.
    pub fn temp_output(&self) -> PathBuf {
        let stem: String = self
            .program
            .as_str()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.temp_dir
            .join(format!("{stem}.{}.slot{}.gif", self.generation, self.slot))
    }
}

/// Which stage failed.
#[derive(Debug)]
pub enum LoopFailure {
    Render(RenderError),
    Publish(RenderError),
}

impl std::fmt::Display for LoopFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopFailure::Render(err) => write!(f, "render failed: {err}"),
            LoopFailure::Publish(err) => write!(f, "publish failed: {err}"),
        }
    }
}

/// Loop state. `started` is the instant the current cycle began.
#[derive(Debug)]
pub enum LoopState {
    Rendering { started: Instant },
    Publishing { started: Instant },
    Sleeping { started: Instant },
    Retrying { failure: LoopFailure },
}

/// Counters reported when a loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Cycles that ended with the slot file updated.
    pub published: u64,
    /// Renders discarded because the slot had moved to a newer generation.
    pub superseded: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
}

/// Sleep before the next cycle: what is left of `refresh`, floored at
/// [`MIN_CYCLE_SLEEP`].
pub fn next_sleep(refresh: Duration, elapsed: Duration) -> Duration {
    refresh.saturating_sub(elapsed).max(MIN_CYCLE_SLEEP)
}

/// One program's indefinite render loop.
pub struct RenderLoop<R: Renderer> {
    settings: LoopSettings,
    renderer: Arc<R>,
    slots: Arc<SlotTable>,
    stats: LoopStats,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(settings: LoopSettings, renderer: Arc<R>, slots: Arc<SlotTable>) -> Self {
        Self {
            settings,
            renderer,
            slots,
            stats: LoopStats::default(),
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Spawn the loop onto the current runtime.
    pub fn spawn(self) -> RenderTaskHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let program = self.settings.program.clone();
        let slot = self.settings.slot;
        let generation = self.settings.generation;
        let join = tokio::spawn(self.run(cancel_rx));
        RenderTaskHandle {
            program,
            slot,
            generation,
            cancel: cancel_tx,
            join,
        }
    }

    /// Drive the state machine until `cancel` flips to `true` (or its sender
    /// is dropped).
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> LoopStats {
        tracing::info!(
            program = %self.settings.program,
            slot = self.settings.slot,
            generation = self.settings.generation,
            refresh_secs = self.settings.refresh.as_secs_f64(),
            "render loop started",
        );

        let mut state = LoopState::Rendering {
            started: Instant::now(),
        };
        loop {
            if *cancel.borrow() {
                break;
            }
            state = match state {
                // Publishing is short and generation-guarded; let it finish.
                publishing @ LoopState::Publishing { .. } => self.step(publishing).await,
                other => {
                    tokio::select! {
                        biased;
                        _ = cancelled(&mut cancel) => break,
                        next = self.step(other) => next,
                    }
                }
            };
        }

        self.remove_temp_output().await;
        tracing::info!(
            program = %self.settings.program,
            slot = self.settings.slot,
            published = self.stats.published,
            failures = self.stats.failures,
            "render loop cancelled",
        );
        self.stats
    }

    /// Perform the work of `state` and return the state that follows it.
    pub async fn step(&mut self, state: LoopState) -> LoopState {
        match state {
            LoopState::Rendering { started } => {
                let job = RenderJob {
                    program: self.settings.program.clone(),
                    source: self.settings.source.clone(),
                    params: self.settings.params.clone(),
                    output: self.settings.temp_output(),
                };
                match self.render(&job).await {
                    Ok(()) => LoopState::Publishing { started },
                    Err(err) => {
                        self.remove_temp_output().await;
                        LoopState::Retrying {
                            failure: LoopFailure::Render(err),
                        }
                    }
                }
            }
            LoopState::Publishing { started } => {
                let output = self.settings.temp_output();
                let result = self
                    .slots
                    .publish(self.settings.slot, self.settings.generation, &output)
                    .await;
                self.remove_temp_output().await;
                match result {
                    Ok(PublishOutcome::Published { path }) => {
                        self.stats.published += 1;
                        self.stats.consecutive_failures = 0;
                        tracing::info!(
                            program = %self.settings.program,
                            slot = self.settings.slot,
                            path = %path.display(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "published slot",
                        );
                        LoopState::Sleeping { started }
                    }
                    Ok(PublishOutcome::Superseded { owner }) => {
                        self.stats.superseded += 1;
                        tracing::debug!(
                            program = %self.settings.program,
                            slot = self.settings.slot,
                            generation = self.settings.generation,
                            owner = ?owner,
                            "slot claimed by a newer generation; render discarded",
                        );
                        LoopState::Sleeping { started }
                    }
                    Err(err) => LoopState::Retrying {
                        failure: LoopFailure::Publish(err),
                    },
                }
            }
            LoopState::Sleeping { started } => {
                let pause = next_sleep(self.settings.refresh, started.elapsed());
                tokio::time::sleep(pause).await;
                LoopState::Rendering {
                    started: Instant::now(),
                }
            }
            LoopState::Retrying { failure } => {
                self.stats.failures += 1;
                self.stats.consecutive_failures += 1;
                tracing::error!(
                    program = %self.settings.program,
                    slot = self.settings.slot,
                    consecutive_failures = self.stats.consecutive_failures,
                    error = %failure,
                    "render cycle failed; retrying in {}s",
                    RETRY_BACKOFF.as_secs(),
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
                LoopState::Rendering {
                    started: Instant::now(),
                }
            }
        }
    }

    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| crate::error::io_err(parent, e))?;
        }
        self.renderer.render(job).await
    }

    async fn remove_temp_output(&self) {
        let output = self.settings.temp_output();
        match tokio::fs::remove_file(&output).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                path = %output.display(),
                error = %err,
                "failed to remove temporary render output",
            ),
        }
    }
}

/// Resolves once cancellation is requested or the handle is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            return;
        }
    }
}

/// Runtime handle for one spawned [`RenderLoop`].
#[derive(Debug)]
pub struct RenderTaskHandle {
    pub program: ProgramName,
    pub slot: usize,
    pub generation: Generation,
    cancel: watch::Sender<bool>,
    join: JoinHandle<LoopStats>,
}

impl RenderTaskHandle {
    /// Request cancellation without waiting for the loop to stop.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn is_alive(&self) -> bool {
        !self.join.is_finished()
    }

    /// Cancel and wait for the loop to exit. `None` if the task panicked.
    pub async fn shutdown(self) -> Option<LoopStats> {
        self.cancel();
        match self.join.await {
            Ok(stats) => Some(stats),
            Err(err) => {
                tracing::error!(program = %self.program, error = %err, "render loop task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_sleep_subtracts_elapsed_time() {
        assert_eq!(
            next_sleep(Duration::from_secs(60), Duration::from_secs(12)),
            Duration::from_secs(48)
        );
    }

    #[test]
    fn next_sleep_never_drops_below_floor() {
        assert_eq!(
            next_sleep(Duration::from_secs(5), Duration::from_secs(9)),
            MIN_CYCLE_SLEEP
        );
        assert_eq!(next_sleep(Duration::ZERO, Duration::ZERO), MIN_CYCLE_SLEEP);
    }

    #[test]
    fn temp_output_is_unique_per_generation() {
        let mut settings = LoopSettings {
            program: ProgramName::from("art/clock.star"),
            source: PathBuf::from("/cache/art/clock.star"),
            params: vec![],
            slot: 0,
            generation: 4,
            refresh: Duration::from_secs(60),
            temp_dir: PathBuf::from("/tmp/diybyt"),
        };
        let first = settings.temp_output();
        settings.generation = 5;
        assert_ne!(first, settings.temp_output());
        assert_eq!(first, PathBuf::from("/tmp/diybyt/art_clock.star.4.slot0.gif"));
    }

    #[test]
    fn flattened_names_in_one_generation_do_not_collide() {
        let nested = LoopSettings {
            program: ProgramName::from("art/clock.star"),
            source: PathBuf::from("/cache/art/clock.star"),
            params: vec![],
            slot: 0,
            generation: 7,
            refresh: Duration::from_secs(60),
            temp_dir: PathBuf::from("/tmp/diybyt"),
        };
        let flat = LoopSettings {
            program: ProgramName::from("art_clock.star"),
            source: PathBuf::from("/cache/art_clock.star"),
            slot: 1,
            ..nested.clone()
        };
        assert_ne!(nested.temp_output(), flat.temp_output());
    }
}

//! Sync service: watcher + debouncer + fallback poll, one task.
//!
//! Checks run at startup, whenever the debouncer fires, and on every poll
//! tick. Watcher failures only disable the notification path; polling keeps
//! the host in sync regardless.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use crate::client::{SyncClient, SyncOutcome, Transport};
use crate::debounce::ChangeDebouncer;
use crate::error::{io_err, SyncError};
use crate::fingerprint::is_hidden_path;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Tunables for [`run`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub poll_interval: Duration,
    pub debounce: ChangeDebouncer,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce: ChangeDebouncer::default(),
        }
    }
}

/// Counters returned when the service stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    pub checks: u64,
    pub transfers: u64,
    pub failures: u64,
    pub debounced_triggers: u64,
}

/// Why a check ran; logged with every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckReason {
    Startup,
    Change,
    Poll,
}

/// Watch `client.root()` and keep the render host in sync until `shutdown`
/// fires.
pub async fn run<T: Transport>(
    mut client: SyncClient<T>,
    options: ServiceOptions,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<ServiceStats, SyncError> {
    let root = client.root().to_path_buf();
    if !root.exists() {
        std::fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    // Canonicalize so event paths (which arrive resolved) match `root`.
    let root = std::fs::canonicalize(&root).unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let watcher = match start_watcher(&root, event_tx) {
        Ok(watcher) => {
            tracing::info!(path = %root.display(), "started monitoring program directory");
            Some(watcher)
        }
        Err(err) => {
            tracing::error!(
                path = %root.display(),
                error = %err,
                "file watcher unavailable; relying on periodic polling",
            );
            None
        }
    };

    let mut stats = ServiceStats::default();
    let mut debouncer = options.debounce;

    check(&mut client, CheckReason::Startup, &mut stats).await;

    let mut poll = tokio::time::interval(options.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    poll.tick().await; // consume the immediate tick; startup already checked

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            event = event_rx.recv(), if watcher.is_some() => {
                let Some(event) = event else { continue };
                match event {
                    Ok(event) if is_relevant_event(&event, &root) => {
                        debouncer.on_event(Instant::now());
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "watcher event error"),
                }
            }
            _ = debouncer.fired() => {
                stats.debounced_triggers += 1;
                check(&mut client, CheckReason::Change, &mut stats).await;
            }
            _ = poll.tick() => {
                check(&mut client, CheckReason::Poll, &mut stats).await;
            }
        }
    }

    tracing::info!(
        checks = stats.checks,
        transfers = stats.transfers,
        failures = stats.failures,
        "sync service stopped",
    );
    Ok(stats)
}

async fn check<T: Transport>(
    client: &mut SyncClient<T>,
    reason: CheckReason,
    stats: &mut ServiceStats,
) {
    stats.checks += 1;
    match client.check_and_sync().await {
        Ok(SyncOutcome::Transferred { files, bytes, .. }) => {
            stats.transfers += 1;
            tracing::debug!(reason = ?reason, files, bytes, "snapshot transferred");
        }
        Ok(SyncOutcome::Unchanged { .. }) => {
            tracing::trace!(reason = ?reason, "no changes");
        }
        Err(err) => {
            stats.failures += 1;
            tracing::error!(reason = ?reason, error = %err, "error during sync");
        }
    }
}

fn start_watcher(
    root: &Path,
    event_tx: mpsc::UnboundedSender<notify::Result<Event>>,
) -> Result<RecommendedWatcher, SyncError> {
    let mut watcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

/// Directory events, access events, hidden files, and editor temp files do
/// not count as changes.
pub fn is_relevant_event(event: &Event, root: &Path) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }
    event.paths.iter().any(|path| is_relevant_path(path, root))
}

fn is_relevant_path(path: &Path, root: &Path) -> bool {
    if path.is_dir() || is_hidden_path(root, path) {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    !(name.ends_with(".tmp") || name.ends_with('~'))
}

/// Resolve the render host URL: explicit value first, then the
/// `_config.render_server_url` entry in the program directory's metadata.
pub fn resolve_server_url(explicit: Option<&str>, root: &Path) -> String {
    match explicit {
        Some(url) if !url.trim().is_empty() => url.trim().to_string(),
        _ => diybyt_core::metadata::render_server_url_at(root),
    }
}

/// The watched root as given on the command line, made absolute.
pub fn absolute_root(root: &Path) -> PathBuf {
    if root.is_absolute() {
        return root.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

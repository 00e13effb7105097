//! Render loop behaviour against scripted renderers.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use diybyt_core::{slots::slot_path, ProgramName};
use diybyt_renderer::{
    render_loop::RETRY_BACKOFF, LoopSettings, RenderError, RenderJob, RenderLoop, Renderer,
    SlotTable,
};
use tempfile::TempDir;

/// Writes `<program>#<n>` to the output, or fails for programs listed in
/// `broken`.
#[derive(Default)]
struct ScriptedRenderer {
    broken: Vec<String>,
    calls: AtomicUsize,
    broken_calls: AtomicUsize,
}

impl Renderer for ScriptedRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.iter().any(|b| b == job.program.as_str()) {
            self.broken_calls.fetch_add(1, Ordering::SeqCst);
            return Err(RenderError::Failed {
                program: job.program.to_string(),
                code: Some(1),
                stdout: String::new(),
                stderr: "syntax error".to_string(),
            });
        }
        std::fs::write(&job.output, format!("{}#{n}", job.program)).map_err(|source| {
            RenderError::Io {
                path: job.output.clone(),
                source,
            }
        })
    }
}

fn settings(work: &TempDir, program: &str, slot: usize, generation: u64) -> LoopSettings {
    LoopSettings {
        program: ProgramName::from(program),
        source: work.path().join("cache").join(program),
        params: vec![],
        slot,
        generation,
        refresh: Duration::from_secs(1),
        temp_dir: work.path().join("temp"),
    }
}

fn read_slot(table: &SlotTable, slot: usize) -> Option<String> {
    std::fs::read_to_string(slot_path(table.dir(), slot)).ok()
}

fn temp_files(work: &TempDir) -> Vec<PathBuf> {
    std::fs::read_dir(work.path().join("temp"))
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn healthy_loop_publishes_and_cleans_temp_output() {
    let work = TempDir::new().expect("work");
    let table = Arc::new(SlotTable::open(work.path().join("gifs")).expect("slots"));
    table.claim(1, 1).await.expect("claim");
    let renderer = Arc::new(ScriptedRenderer::default());

    let handle = RenderLoop::new(settings(&work, "clock.star", 0, 1), renderer.clone(), table.clone())
        .spawn();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while read_slot(&table, 0).is_none() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(handle.is_alive());

    let stats = handle.shutdown().await.expect("stats");
    assert!(stats.published >= 1, "stats: {stats:?}");
    assert_eq!(stats.failures, 0);
    assert!(read_slot(&table, 0).expect("slot0").starts_with("clock.star#"));
    assert!(temp_files(&work).is_empty(), "temp output must be removed");
}

#[tokio::test(start_paused = true)]
async fn broken_program_retries_at_fixed_backoff_without_starving_others() {
    let work = TempDir::new().expect("work");
    let table = Arc::new(SlotTable::open(work.path().join("gifs")).expect("slots"));
    table.claim(1, 2).await.expect("claim");
    let renderer = Arc::new(ScriptedRenderer {
        broken: vec!["broken.star".to_string()],
        ..Default::default()
    });

    let broken = RenderLoop::new(settings(&work, "broken.star", 0, 1), renderer.clone(), table.clone())
        .spawn();
    let healthy = RenderLoop::new(settings(&work, "clock.star", 1, 1), renderer.clone(), table.clone())
        .spawn();

    // Attempts at t = 0, 5, 10, 15, 20.
    tokio::time::sleep(RETRY_BACKOFF * 4 + Duration::from_secs(1)).await;

    assert!(broken.is_alive(), "a failing loop must keep running");
    assert!(healthy.is_alive());

    let broken_stats = broken.shutdown().await.expect("broken stats");
    let healthy_stats = healthy.shutdown().await.expect("healthy stats");

    let attempts = renderer.broken_calls.load(Ordering::SeqCst);
    assert!((4..=5).contains(&attempts), "attempts at 5s cadence, got {attempts}");
    assert_eq!(broken_stats.published, 0);
    assert!(broken_stats.consecutive_failures >= 4);

    assert!(healthy_stats.published >= 10, "healthy: {healthy_stats:?}");
    assert_eq!(healthy_stats.failures, 0);
    assert!(read_slot(&table, 0).is_none(), "broken program never publishes");
    assert!(read_slot(&table, 1).is_some());
}

#[tokio::test]
async fn superseded_loop_discards_its_render() {
    let work = TempDir::new().expect("work");
    let table = Arc::new(SlotTable::open(work.path().join("gifs")).expect("slots"));
    table.claim(1, 1).await.expect("claim gen 1");
    table.claim(2, 1).await.expect("claim gen 2");
    let renderer = Arc::new(ScriptedRenderer::default());

    let mut stale = RenderLoop::new(settings(&work, "old.star", 0, 1), renderer.clone(), table.clone());
    let started = tokio::time::Instant::now();
    let state = stale
        .step(diybyt_renderer::LoopState::Rendering { started })
        .await;
    let state = stale.step(state).await;

    assert!(matches!(state, diybyt_renderer::LoopState::Sleeping { .. }));
    assert_eq!(stale.stats().superseded, 1);
    assert_eq!(stale.stats().published, 0);
    assert!(read_slot(&table, 0).is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn pixlet_renderer_runs_external_binary() {
    use std::os::unix::fs::PermissionsExt;

    use diybyt_renderer::PixletRenderer;

    let work = TempDir::new().expect("work");
    // Stand-in for pixlet: writes its arguments to the `-o` target.
    let script = work.path().join("fake-pixlet");
    std::fs::write(
        &script,
        "#!/bin/sh\nout=\"\"\nprev=\"\"\nfor a in \"$@\"; do\n  if [ \"$prev\" = \"-o\" ]; then out=\"$a\"; fi\n  prev=\"$a\"\ndone\necho \"$@\" > \"$out\"\n",
    )
    .expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let output = work.path().join("out.gif");
    let job = RenderJob {
        program: ProgramName::from("clock.star"),
        source: work.path().join("clock.star"),
        params: vec![("tz".to_string(), "UTC".to_string())],
        output: output.clone(),
    };
    PixletRenderer::new(&script)
        .render(&job)
        .await
        .expect("render");

    let written = std::fs::read_to_string(&output).expect("output");
    assert!(written.starts_with("render "), "got: {written}");
    assert!(written.contains("tz=UTC --gif -o"), "got: {written}");
}

#[cfg(unix)]
#[tokio::test]
async fn pixlet_failure_carries_stderr() {
    use std::os::unix::fs::PermissionsExt;

    use diybyt_renderer::PixletRenderer;

    let work = TempDir::new().expect("work");
    let script = work.path().join("failing-pixlet");
    std::fs::write(&script, "#!/bin/sh\necho 'boom' >&2\nexit 3\n").expect("write script");
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let job = RenderJob {
        program: ProgramName::from("clock.star"),
        source: work.path().join("clock.star"),
        params: vec![],
        output: work.path().join("out.gif"),
    };
    let err = PixletRenderer::new(&script).render(&job).await.unwrap_err();
    match err {
        RenderError::Failed { code, stderr, .. } => {
            assert_eq!(code, Some(3));
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use diybyt_renderer::engine::{DEFAULT_PIXLET_BIN, DEFAULT_RENDER_TIMEOUT};
use diybyt_renderer::{PixletRenderer, Renderer, SlotTable};

use crate::error::{io_err, DaemonError};
use crate::orchestrator::TaskOrchestrator;
use crate::paths::DataPaths;
use crate::server::{router, HostState};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Everything `serve` needs to start the render host.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub pixlet_bin: PathBuf,
    pub render_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            data_dir: PathBuf::from("."),
            pixlet_bin: PathBuf::from(DEFAULT_PIXLET_BIN),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

/// Start the render host and block the current thread until it exits.
pub fn start_blocking(options: HostOptions) -> Result<(), DaemonError> {
    init_tracing(None);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    let (shutdown_tx, _) = broadcast::channel::<()>(4);
    runtime.block_on(async move {
        let signal = {
            let shutdown = shutdown_tx.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("received ctrl-c, shutting down render host"),
                    Err(err) => tracing::error!(error = %err, "ctrl-c handler failed"),
                }
                let _ = shutdown.send(());
            })
        };
        let result = run(options, shutdown_tx.subscribe()).await;
        signal.abort();
        result
    })
}

/// Run the render host with the `pixlet` renderer until `shutdown` fires.
pub async fn run(
    options: HostOptions,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let renderer = PixletRenderer::new(&options.pixlet_bin).with_timeout(options.render_timeout);
    let listener = TcpListener::bind(options.bind)
        .await
        .map_err(|e| io_err(format!("bind {}", options.bind), e))?;
    serve(listener, DataPaths::new(&options.data_dir), renderer, shutdown).await
}

/// Serve on an already bound listener with any [`Renderer`].
///
/// Reconciles once against the surviving cache before accepting requests.
/// On shutdown every render loop is cancelled and awaited, then the temp
/// directory is removed.
pub async fn serve<R: Renderer>(
    listener: TcpListener,
    paths: DataPaths,
    renderer: R,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    paths.ensure()?;
    let slots = SlotTable::open(paths.gif_dir())?;
    let mut orchestrator = TaskOrchestrator::new(
        Arc::new(renderer),
        Arc::new(slots),
        paths.cache_dir(),
        paths.temp_dir(),
    );
    orchestrator.reconcile_from_cache().await?;

    let state = Arc::new(HostState::new(paths.clone(), orchestrator));
    let app = router(state.clone());

    let local = listener
        .local_addr()
        .map_err(|e| io_err("listener address", e))?;
    tracing::info!(address = %local, data_dir = %paths.root().display(), "render host listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|err| DaemonError::Server(err.to_string()));

    state.orchestrator.lock().await.shutdown().await;
    let temp = paths.temp_dir();
    if let Err(err) = tokio::fs::remove_dir_all(&temp).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %temp.display(), error = %err, "failed to remove temp dir");
        }
    }
    tracing::info!("render host stopped");
    served
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins; otherwise `level` (or `LOG_LEVEL`, or `info`).
pub fn init_tracing(level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let fallback = level
        .map(str::to_string)
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string())
        .to_ascii_lowercase();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

//! Render host runtime: orchestrator + snapshot upload + HTTP server.

mod error;
pub mod orchestrator;
pub mod paths;
mod runtime;
pub mod server;
pub mod upload;

pub use error::DaemonError;
pub use orchestrator::{HostStatus, LoopStatus, ReconcileReport, TaskOrchestrator};
pub use paths::DataPaths;
pub use runtime::{init_tracing, run, serve, start_blocking, HostOptions, DEFAULT_BIND};

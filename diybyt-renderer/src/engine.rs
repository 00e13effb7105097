//! External renderer seam: [`Renderer`] trait and [`PixletRenderer`].
//!
//! # Invocation shape
//!
//! ```text
//! pixlet render <source> key1=value1 key2=value2 --gif -o <output>
//! ```
//!
//! The renderer is a black box: a zero exit status plus a file at `<output>`
//! is success, anything else is a [`RenderError`].

use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use diybyt_core::ProgramName;

use crate::error::RenderError;

pub const DEFAULT_PIXLET_BIN: &str = "pixlet";

/// Upper bound on one renderer invocation.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// One render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderJob {
    pub program: ProgramName,
    pub source: PathBuf,
    /// `key=value` parameters, in document order.
    pub params: Vec<(String, String)>,
    /// Private output path; the caller publishes it afterwards.
    pub output: PathBuf,
}

/// Something that can turn a [`RenderJob`] into an image file.
///
/// Dropping the returned future must abandon the render (the pixlet
/// implementation kills its child process).
pub trait Renderer: Send + Sync + 'static {
    fn render(&self, job: &RenderJob) -> impl Future<Output = Result<(), RenderError>> + Send;
}

/// Runs the `pixlet` CLI as a child process.
#[derive(Debug, Clone)]
pub struct PixletRenderer {
    binary: PathBuf,
    timeout: Duration,
}

impl Default for PixletRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PIXLET_BIN)
    }
}

impl PixletRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Arguments passed to the binary for `job`.
    pub fn command_args(job: &RenderJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["render".into(), job.source.clone().into()];
        for (key, value) in &job.params {
            args.push(format!("{key}={value}").into());
        }
        args.push("--gif".into());
        args.push("-o".into());
        args.push(job.output.clone().into());
        args
    }

    async fn run(&self, job: &RenderJob) -> Result<(), RenderError> {
        tracing::debug!(
            program = %job.program,
            binary = %self.binary.display(),
            source = %job.source.display(),
            "invoking renderer",
        );

        let child = Command::new(&self.binary)
            .args(Self::command_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RenderError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| crate::error::io_err(&self.binary, e))?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                program: job.program.to_string(),
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(RenderError::MissingOutput {
                path: job.output.clone(),
            }),
        }
    }
}

impl Renderer for PixletRenderer {
    async fn render(&self, job: &RenderJob) -> Result<(), RenderError> {
        match tokio::time::timeout(self.timeout, self.run(job)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::TimedOut {
                program: job.program.to_string(),
                after: self.timeout,
            }),
        }
    }
}

//! Sync client: hash-gated upload of the program directory.
//!
//! ## `check_and_sync`
//!
//! 1. Fingerprint the directory (blocking pool).
//! 2. Equal to the last confirmed hash → `Unchanged`, nothing sent.
//! 3. Pack a zip snapshot and upload it in one request.
//! 4. Advance the confirmed hash only if the host reports it applied the
//!    snapshot (`{"status": "success"}` on a 2xx response).
//!
//! A failed transfer leaves the confirmed hash where it was, so the next
//! check retries the same content.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::archive;
use crate::error::SyncError;
use crate::fingerprint::{DirectoryFingerprint, SnapshotHash};
use crate::protocol::{endpoint, UpdateResponse, UPDATE_PATH, UPLOAD_FIELD, UPLOAD_FILE_NAME};

pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Delivers a packed snapshot to the render host.
pub trait Transport: Send + Sync {
    fn upload(&self, archive: Vec<u8>)
        -> impl Future<Output = Result<UpdateResponse, SyncError>> + Send;
}

/// Multipart upload over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    server_url: String,
}

impl HttpTransport {
    pub fn new(server_url: impl Into<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_UPLOAD_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            server_url: server_url.into(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

impl Transport for HttpTransport {
    async fn upload(&self, archive: Vec<u8>) -> Result<UpdateResponse, SyncError> {
        let part = Part::bytes(archive)
            .file_name(UPLOAD_FILE_NAME)
            .mime_str("application/zip")?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .http
            .post(endpoint(&self.server_url, UPDATE_PATH))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let payload = serde_json::from_str::<UpdateResponse>(&body)
            .unwrap_or_else(|_| UpdateResponse::error(body.trim().to_string()));

        if !status.is_success() || !payload.is_success() {
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                message: payload.message,
            });
        }
        Ok(payload)
    }
}

/// What a check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Content matches the last confirmed snapshot.
    Unchanged { hash: SnapshotHash },
    /// A new snapshot was uploaded and applied by the host.
    Transferred {
        hash: SnapshotHash,
        files: usize,
        bytes: usize,
    },
}

pub struct SyncClient<T: Transport = HttpTransport> {
    root: PathBuf,
    transport: T,
    last_confirmed: Option<SnapshotHash>,
}

impl SyncClient<HttpTransport> {
    /// Client that uploads `root` to the render host at `server_url`.
    pub fn http(root: impl Into<PathBuf>, server_url: &str) -> Result<Self, SyncError> {
        Ok(Self::new(root, HttpTransport::new(server_url)?))
    }
}

impl<T: Transport> SyncClient<T> {
    pub fn new(root: impl Into<PathBuf>, transport: T) -> Self {
        Self {
            root: root.into(),
            transport,
            last_confirmed: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Hash of the last snapshot the host confirmed, if any.
    pub fn last_confirmed(&self) -> Option<&SnapshotHash> {
        self.last_confirmed.as_ref()
    }

    /// Upload the directory if it changed since the last confirmed transfer.
    pub async fn check_and_sync(&mut self) -> Result<SyncOutcome, SyncError> {
        let root = self.root.clone();
        let (files, hash) = tokio::task::spawn_blocking(move || {
            let files = DirectoryFingerprint::tracked_files(&root)?;
            let hash = DirectoryFingerprint::compute_files(&files)?;
            Ok::<_, SyncError>((files, hash))
        })
        .await
        .map_err(|err| SyncError::Join(err.to_string()))??;

        if self.last_confirmed.as_ref() == Some(&hash) {
            tracing::debug!(hash = %hash.short(), "program directory unchanged");
            return Ok(SyncOutcome::Unchanged { hash });
        }

        tracing::info!(
            hash = %hash.short(),
            files = files.len(),
            "changes detected, syncing to render server",
        );

        let file_count = files.len();
        let bytes = tokio::task::spawn_blocking(move || archive::pack(&files))
            .await
            .map_err(|err| SyncError::Join(err.to_string()))??;
        let size = bytes.len();

        let response = self.transport.upload(bytes).await?;
        tracing::info!(
            hash = %hash.short(),
            bytes = size,
            message = %response.message,
            "sync successful",
        );
        self.last_confirmed = Some(hash.clone());
        Ok(SyncOutcome::Transferred {
            hash,
            files: file_count,
            bytes: size,
        })
    }
}

//! Wire types for the render host's HTTP surface.
//!
//! ```text
//! POST /update        multipart field "file" = zip snapshot
//!   -> {"status": "success" | "error", "message": "..."}
//! GET  /status        -> host status JSON
//! GET  /gifs/slotN.gif
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;

pub const UPDATE_PATH: &str = "/update";
pub const STATUS_PATH: &str = "/status";
pub const UPLOAD_FIELD: &str = "file";
pub const UPLOAD_FILE_NAME: &str = "star_programs.zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Error,
}

/// Body returned by `POST /update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub status: UpdateStatus,
    pub message: String,
}

impl UpdateResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: UpdateStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == UpdateStatus::Success
    }
}

/// `<base>/<path>` without doubling the slash.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Fetch the render host's status document.
pub async fn fetch_status(http: &reqwest::Client, base_url: &str) -> Result<Value, SyncError> {
    let response = http.get(endpoint(base_url, STATUS_PATH)).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SyncError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response.json::<Value>().await?)
}

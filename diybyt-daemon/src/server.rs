//! HTTP surface of the render host.
//!
//! ```text
//! POST /update          multipart "file" = zip snapshot
//! GET  /status          running loops, generation, last reconcile
//! GET  /gifs/slotN.gif  published slot files
//! ```

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use diybyt_renderer::Renderer;
use diybyt_sync::protocol::{UpdateResponse, STATUS_PATH, UPDATE_PATH, UPLOAD_FIELD};

use crate::error::DaemonError;
use crate::orchestrator::TaskOrchestrator;
use crate::paths::DataPaths;
use crate::upload::apply_snapshot;

/// Largest snapshot `POST /update` accepts. Program directories carry
/// images and fonts next to their sources, so this sits far above axum's
/// 2 MiB default.
pub const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Shared state behind every route.
pub struct HostState<R: Renderer> {
    pub paths: DataPaths,
    /// Uploads and reconciliations both go through this lock.
    pub orchestrator: Mutex<TaskOrchestrator<R>>,
}

impl<R: Renderer> HostState<R> {
    pub fn new(paths: DataPaths, orchestrator: TaskOrchestrator<R>) -> Self {
        Self {
            paths,
            orchestrator: Mutex::new(orchestrator),
        }
    }
}

pub fn router<R: Renderer>(state: Arc<HostState<R>>) -> Router {
    let gifs = ServeDir::new(state.paths.gif_dir());
    Router::new()
        .route(
            UPDATE_PATH,
            post(update_programs::<R>).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(STATUS_PATH, get(host_status::<R>))
        .nest_service("/gifs", gifs)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /update: replace the program cache and reconcile.
async fn update_programs<R: Renderer>(
    State(state): State<Arc<HostState<R>>>,
    multipart: Multipart,
) -> impl IntoResponse {
    let archive = match read_upload(multipart).await {
        Ok(archive) => archive,
        Err(message) => {
            tracing::warn!(%message, "rejected update request");
            return (StatusCode::BAD_REQUEST, Json(UpdateResponse::error(message)));
        }
    };

    match apply_and_reconcile(&state, archive).await {
        Ok(()) => (
            StatusCode::OK,
            Json(UpdateResponse::success("Programs updated successfully")),
        ),
        Err(err) => {
            tracing::error!(error = %err, "error processing update");
            let status = if err.is_bad_upload() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(UpdateResponse::error(err.to_string())))
        }
    }
}

/// Bytes of the `file` field (or, failing that, the first file field).
async fn read_upload(mut multipart: Multipart) -> Result<Vec<u8>, String> {
    let mut fallback = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(format!("malformed multipart body: {err}")),
        };
        let is_upload_field = field.name() == Some(UPLOAD_FIELD);
        let is_file = field.file_name().is_some();
        if !is_upload_field && !is_file {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|err| format!("failed to read upload: {err}"))?;
        if is_upload_field {
            return Ok(bytes.to_vec());
        }
        if fallback.is_none() {
            fallback = Some(bytes.to_vec());
        }
    }
    fallback.ok_or_else(|| format!("missing multipart field '{UPLOAD_FIELD}'"))
}

async fn apply_and_reconcile<R: Renderer>(
    state: &HostState<R>,
    archive: Vec<u8>,
) -> Result<(), DaemonError> {
    let mut orchestrator = state.orchestrator.lock().await;

    let paths = state.paths.clone();
    tokio::task::spawn_blocking(move || apply_snapshot(&archive, &paths))
        .await
        .map_err(|err| DaemonError::Join(err.to_string()))??;

    orchestrator.reconcile_from_cache().await?;
    Ok(())
}

/// GET /status
async fn host_status<R: Renderer>(State(state): State<Arc<HostState<R>>>) -> impl IntoResponse {
    let status = state.orchestrator.lock().await.status();
    Json(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use diybyt_renderer::{RenderError, RenderJob, SlotTable};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Idle;

    impl Renderer for Idle {
        async fn render(&self, _job: &RenderJob) -> Result<(), RenderError> {
            std::future::pending().await
        }
    }

    fn app(dir: &TempDir) -> Router {
        let paths = DataPaths::new(dir.path());
        paths.ensure().expect("ensure");
        let slots = SlotTable::open(paths.gif_dir()).expect("slots");
        let orchestrator = TaskOrchestrator::new(
            Arc::new(Idle),
            Arc::new(slots),
            paths.cache_dir(),
            paths.temp_dir(),
        );
        router(Arc::new(HostState::new(paths, orchestrator)))
    }

    #[tokio::test]
    async fn status_reports_generation_and_loops() {
        let dir = TempDir::new().expect("tempdir");
        let resp = app(&dir)
            .oneshot(Request::builder().uri("/status").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.expect("body").to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(json["generation"], 0);
        assert_eq!(json["loops"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn published_slot_is_served_under_gifs() {
        let dir = TempDir::new().expect("tempdir");
        let router = app(&dir);
        std::fs::write(dir.path().join("gifs/slot0.gif"), b"GIF89a").expect("write");

        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/gifs/slot0.gif")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"GIF89a");
    }

    #[tokio::test]
    async fn slot_files_allow_any_origin() {
        let dir = TempDir::new().expect("tempdir");
        let router = app(&dir);
        std::fs::write(dir.path().join("gifs/slot0.gif"), b"GIF89a").expect("write");

        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/gifs/slot0.gif")
                    .header("origin", "http://display.local")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::OK);
        let allow = resp
            .headers()
            .get("access-control-allow-origin")
            .expect("cors header");
        assert_eq!(allow, "*");
    }

    #[tokio::test]
    async fn update_without_file_field_is_bad_request() {
        let dir = TempDir::new().expect("tempdir");
        let boundary = "diybyt-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let resp = app(&dir)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = resp.into_body().collect().await.expect("body").to_bytes();
        let reply: UpdateResponse = serde_json::from_slice(&body).expect("json");
        assert!(!reply.is_success());
    }
}

//! Route table and handlers.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/api/jobs` | submit a URL |
//! | `GET` | `/api/jobs/{id}` | job snapshot |
//! | `DELETE` | `/api/jobs/{id}` | cancel a job |
//! | `GET` | `/api/artifacts/{id}` | download, then release |
//! | `GET` | `/api/health` | counts and proxy health |

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use mime_guess::MimeGuess;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use mediafetch_core::{ArtifactId, Job, JobId};
use mediafetch_fetch::ProxyHealth;
use mediafetch_store::SubmitOptions;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying an explicit client identity.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/jobs", post(submit_job))
        .route("/api/jobs/{id}", get(get_job).delete(cancel_job))
        .route("/api/artifacts/{id}", get(download_artifact))
        .route("/api/health", get(health))
        .with_state(state)
}

// ============================================================================
// Jobs
// ============================================================================

/// `POST /api/jobs` body.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitRequest {
    /// Video page URL.
    pub url: String,
    /// Optional quality hint.
    #[serde(default)]
    pub quality: Option<String>,
}

/// `POST /api/jobs` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Id of the new or deduplicated job.
    pub job_id: JobId,
}

async fn submit_job(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let Json(request) =
        body.map_err(|e| ApiError::bad_request("InvalidRequest", e.body_text()))?;

    let options = SubmitOptions {
        quality: request.quality,
        client_id: client_id(&headers),
    };
    let job_id = state.coordinator.submit(&request.url, options)?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    let id = JobId::new(id);
    state
        .coordinator
        .status(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job not found: {id}")))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.coordinator.cancel(&JobId::new(id))?;
    Ok(Json(job))
}

/// Client identity: `x-client-id`, else the first `x-forwarded-for` hop.
fn client_id(headers: &HeaderMap) -> Option<String> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    header_value(CLIENT_ID_HEADER)
        .or_else(|| {
            header_value("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .map(str::to_string)
}

// ============================================================================
// Artifacts
// ============================================================================

async fn download_artifact(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = ArtifactId::new(id);
    let reader = state.artifacts.open(&id).await?;
    let artifact = reader.artifact().clone();
    let mime = MimeGuess::from_path(&artifact.file_path).first_or_octet_stream();

    info!(artifact = %id, size = artifact.size, "Serving artifact");
    let body = Body::from_stream(ReaderStream::new(reader));
    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, artifact.size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", header_safe(&artifact.file_name)),
        )
        .body(body)
        .map_err(|e| ApiError::internal(e.to_string()))
}

fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ============================================================================
// Health
// ============================================================================

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok` or `shutting_down`.
    pub status: &'static str,
    /// Jobs waiting for a slot.
    pub queued: usize,
    /// Jobs extracting.
    pub running: usize,
    /// Artifacts awaiting download.
    pub artifacts: usize,
    /// Per-proxy health.
    pub proxies: Vec<ProxyHealth>,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.coordinator.stats();
    let status = if state.coordinator.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    debug!(queued = stats.queued, running = stats.running, "Health check");
    Json(HealthResponse {
        status,
        queued: stats.queued,
        running: stats.running,
        artifacts: state.artifacts.len(),
        proxies: state.proxies.snapshot(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_id_prefers_explicit_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_id(&headers).as_deref(), Some("203.0.113.9"));

        headers.insert(CLIENT_ID_HEADER, HeaderValue::from_static("app-42"));
        assert_eq!(client_id(&headers).as_deref(), Some("app-42"));

        assert_eq!(client_id(&HeaderMap::new()), None);
    }

    #[test]
    fn test_header_safe_filename() {
        assert_eq!(header_safe("clip \"final\".mp4"), "clip _final_.mp4");
        assert_eq!(header_safe("vidéo.mp4"), "vid_o.mp4");
    }
}

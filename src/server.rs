//! HTTP routes serving cached audio to constrained clients.
//!
//! Every audio route goes through `CacheManager::ensure_local_artifact`, so the
//! URLs handed out point back at this service and never expire upstream.
//! Upstream failure detail is logged, never returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::downloader::{normalize_video_id, CacheManager, MetadataLookup};

pub const SERVICE_NAME: &str = "youtube-audio-proxy";
const URL_NOTE: &str = "Audio is cached locally on server; URL does not expire until cache evicts.";

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheManager>,
    pub metadata: Arc<dyn MetadataLookup>,
    /// Base for `stream_url`; falls back to `http://{Host}`
    pub public_base_url: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/audio/{video_id}", get(audio_handler))
        .route("/stream/{video_id}", get(audio_handler))
        .route("/url/{video_id}", get(url_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// MIME type served for a cache format
pub fn content_type_for(format: &str) -> &'static str {
    match format.to_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "opus" | "ogg" => "audio/ogg",
        "webm" => "audio/webm",
        "aac" => "audio/aac",
        _ => "application/octet-stream",
    }
}

/// Generic failure envelope
#[derive(Debug)]
pub struct ApiError {
    video_id: String,
    message: &'static str,
}

impl ApiError {
    fn new(video_id: &str, message: &'static str) -> Self {
        Self {
            video_id: video_id.to_string(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "video_id": self.video_id,
            "error": self.message,
        });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn audio_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Response, ApiError> {
    const FAILED: &str = "Failed to prepare audio file";

    let path = state.cache.ensure_local_artifact(&video_id).await.map_err(|e| {
        tracing::error!(video_id = %video_id, error = %e, "audio request failed");
        ApiError::new(&video_id, FAILED)
    })?;

    // the janitor may have removed the file in between; treat like any other failure
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "cannot open cached artifact");
        ApiError::new(&video_id, FAILED)
    })?;
    let length = file.metadata().await.map(|m| m.len()).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "cannot stat cached artifact");
        ApiError::new(&video_id, FAILED)
    })?;

    tracing::info!(video_id = %video_id, bytes = length, "serving cached audio");
    let headers = [
        (
            CONTENT_TYPE,
            content_type_for(&state.cache.settings().audio_format).to_string(),
        ),
        (CONTENT_LENGTH, length.to_string()),
        (CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

#[derive(Debug, Serialize)]
struct UrlResponse {
    success: bool,
    video_id: String,
    stream_url: String,
    title: Option<String>,
    duration: Option<u64>,
    note: &'static str,
}

async fn url_handler(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<UrlResponse>, ApiError> {
    tracing::info!(video_id = %video_id, "url request");

    state.cache.ensure_local_artifact(&video_id).await.map_err(|e| {
        tracing::error!(video_id = %video_id, error = %e, "url request failed");
        ApiError::new(&video_id, "Could not download audio")
    })?;

    let canonical = normalize_video_id(&video_id);
    let base = state
        .public_base_url
        .clone()
        .or_else(|| {
            headers
                .get(HOST)
                .and_then(|h| h.to_str().ok())
                .map(|host| format!("http://{}", host))
        })
        .unwrap_or_default();
    let info = state.metadata.video_info(&canonical).await;

    Ok(Json(UrlResponse {
        success: true,
        stream_url: format!("{}/audio/{}", base, canonical),
        video_id,
        title: info.as_ref().and_then(|i| i.title.clone()),
        duration: info.and_then(|i| i.duration_seconds),
        note: URL_NOTE,
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    cache_files: usize,
    cache_mb: f64,
    endpoints: BTreeMap<&'static str, &'static str>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.cache.stats().await;

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        cache_files: stats.files,
        cache_mb: stats.megabytes(),
        endpoints: BTreeMap::from([
            ("/audio/{video_id}", "Stream/download audio"),
            ("/stream/{video_id}", "Stream/download audio (alias)"),
            ("/url/{video_id}", "Get stream URL as JSON"),
            ("/health", "Service and cache status"),
        ]),
    })
}

//! HTTP surface: generate a video, fetch videos, health.

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, Path as UrlPath, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use scenecraft_core::{AnimationPipeline, AnimationRequest, JobId, VERSION};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;

use crate::error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AnimationPipeline>,
    /// Base URL clients use to reach this server, without a trailing slash.
    pub public_url: String,
}

impl AppState {
    pub fn new(pipeline: Arc<AnimationPipeline>, public_url: impl Into<String>) -> Self {
        let public_url = public_url.into().trim_end_matches('/').to_string();
        Self {
            pipeline,
            public_url,
        }
    }

    fn video_url(&self, job_id: JobId) -> String {
        format!("{}/video/{}", self.public_url, job_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub job_id: JobId,
    pub video_url: String,
    pub scene_logic: Vec<String>,
    pub generated_code: String,
    pub script_digest: String,
}

/// Build the application router. CORS is permissive: the front-end is
/// served from a different origin.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/video", get(latest_video))
        .route("/video/{job_id}", get(video_by_id))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "version": VERSION }))
}

async fn generate(
    State(state): State<AppState>,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::invalid_input(rejection.body_text()))?;
    let request = AnimationRequest::new(body.description)?;

    let output = state.pipeline.run(&request).await?;

    Ok(Json(GenerateResponse {
        job_id: output.job_id,
        video_url: state.video_url(output.job_id),
        scene_logic: output.scene_logic,
        generated_code: output.scene_code,
        script_digest: output.script_digest,
    }))
}

async fn latest_video(State(state): State<AppState>) -> Result<Response, ApiError> {
    let latest = state.pipeline.latest_artifact().map_err(|err| {
        tracing::error!(error = %err, "failed to scan working areas");
        ApiError::internal()
    })?;
    match latest {
        Some((_, path)) => stream_video(&path).await,
        None => Err(ApiError::artifact_missing()),
    }
}

async fn video_by_id(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> Result<Response, ApiError> {
    let job_id: JobId = job_id
        .parse()
        .map_err(|_| ApiError::invalid_input(format!("'{}' is not a job id.", job_id)))?;
    match state.pipeline.artifact_for(job_id) {
        Some(path) => stream_video(&path).await,
        None => Err(ApiError::artifact_missing()),
    }
}

async fn stream_video(path: &Path) -> Result<Response, ApiError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        // Pruned between lookup and open.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::artifact_missing())
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "failed to open video");
            return Err(ApiError::internal());
        }
    };
    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, "video/mp4")], body).into_response())
}

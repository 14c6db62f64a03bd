//! Defines the `ApiError` type returned by every handler.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use scenecraft_core::{ErrorKind, PipelineError, PipelineFailure};
use serde_json::json;

/// An error already reduced to what a caller may see: a stable kind and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: StatusCode::from_u16(kind.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// A video lookup that found nothing. Unlike a render that produced no
    /// file, this is a 404.
    pub fn artifact_missing() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            ..Self::new(ErrorKind::ArtifactMissing, "No rendered video is available.")
        }
    }

    pub fn internal() -> Self {
        Self::new(ErrorKind::Internal, "An internal error occurred.")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::new(err.kind(), err.public_message())
    }
}

/// Details were already logged by the pipeline; only the public part survives.
impl From<PipelineFailure> for ApiError {
    fn from(failure: PipelineFailure) -> Self {
        failure.error.into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind.as_str(), "request failed: {}", self.message);
        }
        let body = json!({
            "kind": self.kind.as_str(),
            "message": self.message,
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_maps_to_kind_status() {
        let err: ApiError = PipelineError::RenderTimeout { limit_ms: 5000 }.into();
        assert_eq!(err.kind, ErrorKind::RenderTimeout);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(err.message.contains("5 seconds"));
    }

    #[test]
    fn test_lookup_miss_is_not_found() {
        assert_eq!(ApiError::artifact_missing().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_render_without_artifact_is_server_error() {
        let err: ApiError = PipelineError::ArtifactMissing {
            path: "/tmp/x.mp4".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("/tmp"));
    }
}

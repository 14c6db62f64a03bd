//! Pipeline error taxonomy.
//!
//! [`PipelineError`] keeps the full internal detail for logs. Callers outside
//! the process only ever see an [`ErrorKind`] and
//! [`PipelineError::public_message`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::generator::GeneratorError;
use crate::validator::ParseError;
use crate::workspace::WorkspaceError;

/// Externally visible error kinds, each with a stable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    AiUnavailable,
    GenerationInvalid,
    RenderFailed,
    RenderTimeout,
    ArtifactMissing,
    Internal,
}

impl ErrorKind {
    /// Stable identifier used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::AiUnavailable => "ai_unavailable",
            ErrorKind::GenerationInvalid => "generation_invalid",
            ErrorKind::RenderFailed => "render_failed",
            ErrorKind::RenderTimeout => "render_timeout",
            ErrorKind::ArtifactMissing => "artifact_missing",
            ErrorKind::Internal => "internal",
        }
    }

    /// HTTP status code for this kind.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::AiUnavailable | ErrorKind::GenerationInvalid => 502,
            ErrorKind::RenderTimeout => 504,
            ErrorKind::RenderFailed | ErrorKind::ArtifactMissing | ErrorKind::Internal => 500,
        }
    }
}

/// Every way a pipeline invocation can fail.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),

    #[error("invalid model output: {0}")]
    InvalidOutput(#[from] ParseError),

    #[error("renderer exited with code {exit_code}")]
    RenderFailed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("render timed out after {limit_ms}ms")]
    RenderTimeout { limit_ms: u64 },

    #[error("renderer produced no artifact at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Collapse into the external kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidInput(_) => ErrorKind::InvalidInput,
            PipelineError::Generator(_) => ErrorKind::AiUnavailable,
            PipelineError::InvalidOutput(_) => ErrorKind::GenerationInvalid,
            PipelineError::RenderFailed { .. } => ErrorKind::RenderFailed,
            PipelineError::RenderTimeout { .. } => ErrorKind::RenderTimeout,
            PipelineError::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            PipelineError::Workspace(_) | PipelineError::Io(_) | PipelineError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Human-readable message safe to return to a caller.
    ///
    /// Never includes captured process output, raw model text or paths.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(reason) => format!("Invalid request: {}", reason),
            PipelineError::Generator(_) => "The AI service is unavailable.".to_string(),
            PipelineError::InvalidOutput(_) => "AI returned invalid output.".to_string(),
            PipelineError::RenderFailed { exit_code, .. } => format!(
                "Rendering failed (renderer exited with code {}).",
                exit_code
            ),
            PipelineError::RenderTimeout { limit_ms } => {
                format!("Rendering timed out after {} seconds.", limit_ms / 1000)
            }
            PipelineError::ArtifactMissing { .. } => {
                "Rendering finished but no video was produced.".to_string()
            }
            PipelineError::Workspace(_) | PipelineError::Io(_) | PipelineError::Internal(_) => {
                "An internal error occurred.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ParseFailure;

    #[test]
    fn test_error_kind_identifiers_are_stable() {
        assert_eq!(ErrorKind::InvalidInput.as_str(), "invalid_input");
        assert_eq!(ErrorKind::AiUnavailable.as_str(), "ai_unavailable");
        assert_eq!(ErrorKind::GenerationInvalid.as_str(), "generation_invalid");
        assert_eq!(ErrorKind::RenderFailed.as_str(), "render_failed");
        assert_eq!(ErrorKind::RenderTimeout.as_str(), "render_timeout");
        assert_eq!(ErrorKind::ArtifactMissing.as_str(), "artifact_missing");
        assert_eq!(ErrorKind::Internal.as_str(), "internal");
    }

    #[test]
    fn test_error_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&ErrorKind::RenderTimeout).unwrap();
        assert_eq!(json, "\"render_timeout\"");
    }

    #[test]
    fn test_render_failure_hides_stderr() {
        let err = PipelineError::RenderFailed {
            exit_code: 1,
            stdout: "".to_string(),
            stderr: "Traceback: secret /home/user/path".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::RenderFailed);
        let msg = err.public_message();
        assert!(msg.contains("Rendering failed"));
        assert!(!msg.contains("Traceback"));
    }

    #[test]
    fn test_parse_error_maps_to_generation_invalid() {
        let err: PipelineError = ParseError {
            reason: ParseFailure::MissingField("manim_code"),
            raw: "{}".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::GenerationInvalid);
        assert_eq!(err.public_message(), "AI returned invalid output.");
        assert_eq!(err.kind().http_status(), 502);
    }

    #[test]
    fn test_timeout_status() {
        let err = PipelineError::RenderTimeout { limit_ms: 120_000 };
        assert_eq!(err.kind().http_status(), 504);
        assert!(err.public_message().contains("120 seconds"));
    }
}

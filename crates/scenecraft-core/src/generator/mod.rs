//! AI service boundary.
//!
//! The pipeline treats the model as an opaque text-completion service: a
//! description goes in, a blob of text intended to decode into
//! [`crate::GenerationResult`] comes out.

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;

pub use gemini::{GeminiConfig, GeminiGenerator};
pub use prompt::{PROMPT_VERSION, SCENE_CLASS, SYSTEM_PROMPT};

/// Failures talking to the model service.
#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned no text")]
    EmptyResponse,
}

/// A text-completion backend that writes scenes.
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    /// Ask the model for a scene matching `description`; returns its raw text.
    async fn generate(&self, description: &str) -> Result<String, GeneratorError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::SYSTEM_PROMPT;
use super::{GeneratorError, SceneGenerator};

/// Gemini configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (required to generate)
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-pro-latest`
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-pro-latest".to_string()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            request_timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Set the model
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn request_body(description: &str) -> GenerateRequest<'_> {
    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: SYSTEM_PROMPT,
            }],
        },
        contents: vec![Content {
            role: Some("user"),
            parts: vec![Part { text: description }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
        },
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Result<String, GeneratorError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(GeneratorError::EmptyResponse)
    } else {
        Ok(text)
    }
}

/// Scene generator backed by the Gemini API.
pub struct GeminiGenerator {
    config: GeminiConfig,
    http_client: reqwest::Client,
}

impl GeminiGenerator {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self, GeneratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("scenecraft/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(GeminiGenerator {
            config,
            http_client,
        })
    }

    /// Create client from environment variables
    pub fn from_env() -> Result<Self, GeneratorError> {
        Self::new(GeminiConfig::from_env())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl SceneGenerator for GeminiGenerator {
    async fn generate(&self, description: &str) -> Result<String, GeneratorError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GeneratorError::MissingApiKey)?;

        debug!(model = %self.config.model, "Requesting scene from Gemini");

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request_body(description))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        candidate_text(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_key() -> GeminiConfig {
        GeminiConfig {
            api_key: None,
            model: "gemini-pro-latest".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 5,
        }
    }

    #[test]
    fn test_endpoint() {
        let config = config_without_key().with_model("gemini-1.5-flash");
        assert_eq!(
            config.endpoint(),
            "http://127.0.0.1:9/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(request_body("draw a circle")).unwrap();
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "draw a circle");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("manim_code"));
        assert!(body["systemInstruction"].get("role").is_none());
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "{\"scene_logic\":"}, {"text": " []}"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(candidate_text(response).unwrap(), "{\"scene_logic\": []}");
    }

    #[test]
    fn test_candidate_text_empty() {
        let response: GenerateResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(matches!(
            candidate_text(response),
            Err(GeneratorError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_generate_without_key_fails_fast() {
        let generator = GeminiGenerator::new(config_without_key()).unwrap();
        let err = generator.generate("draw a circle").await.unwrap_err();
        assert!(matches!(err, GeneratorError::MissingApiKey));
    }

    #[tokio::test]
    async fn test_transport_error_keeps_source() {
        let config = GeminiConfig {
            api_key: Some("test-key".to_string()),
            ..config_without_key()
        };
        let generator = GeminiGenerator::new(config).unwrap();
        let err = generator.generate("draw a circle").await.unwrap_err();

        assert!(matches!(err, GeneratorError::Http(_)), "got {:?}", err);
        assert!(std::error::Error::source(&err).is_some());
    }
}

//! Inbound request and invocation identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PipelineError;

/// Longest description accepted, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 4000;

/// A natural-language description of the animation to build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationRequest {
    description: String,
}

impl AnimationRequest {
    /// Create a request, trimming surrounding whitespace.
    ///
    /// Blank descriptions and descriptions over [`MAX_DESCRIPTION_CHARS`]
    /// are rejected with [`PipelineError::InvalidInput`].
    pub fn new(description: impl Into<String>) -> Result<Self, PipelineError> {
        let description = description.into().trim().to_string();

        if description.is_empty() {
            return Err(PipelineError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        let chars = description.chars().count();
        if chars > MAX_DESCRIPTION_CHARS {
            return Err(PipelineError::InvalidInput(format!(
                "description is {} characters, limit is {}",
                chars, MAX_DESCRIPTION_CHARS
            )));
        }

        Ok(Self { description })
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// Identity of one pipeline invocation. Names its working area on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

//! Structured model output.

use serde::{Deserialize, Serialize};

/// Explanation and script decoded from one model response.
///
/// Both fields are non-empty once produced by [`crate::validator::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Ordered, human-readable animation steps.
    pub scene_logic: Vec<String>,

    /// Script text as returned by the model (not yet sanitized).
    pub scene_code: String,
}

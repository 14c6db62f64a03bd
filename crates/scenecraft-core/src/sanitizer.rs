//! Code sanitization: make generated script text executable as-is.
//!
//! Two guarantees, applied in order:
//! 1. no markdown fence markers remain anywhere in the text;
//! 2. the Manim and NumPy imports are present (prepended only when absent).
//!
//! Presence is checked by substring, so sanitizing twice is a no-op.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Import that brings the animation library's namespace into scope.
pub const MANIM_IMPORT: &str = "from manim import *";

/// Import for the numeric-array library.
pub const NUMPY_IMPORT: &str = "import numpy as np";

const FENCE: &str = "```";

/// A line holding only a fence marker and an optional language tag,
/// including its line break.
fn fence_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+.\-]*[ \t]*(?:\r?\n|\z)")
            .expect("fence pattern is valid")
    })
}

/// Script text that satisfies the execution preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SanitizedScript(String);

impl SanitizedScript {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// SHA-256 hex of the script text.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for SanitizedScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedScript {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sanitize generated script text. Never fails.
pub fn sanitize(code: &str) -> SanitizedScript {
    let mut text = strip_fences(code);

    if !text.contains(MANIM_IMPORT) {
        text = format!("{}\n{}", MANIM_IMPORT, text);
    }
    if !text.contains(NUMPY_IMPORT) {
        text = format!("{}\n{}", NUMPY_IMPORT, text);
    }

    SanitizedScript(text)
}

/// Remove fence markers until none are left.
///
/// Fence lines go with their line break. Markers elsewhere lose only the
/// backticks, so the surrounding lines stay apart. A single pass can splice
/// stray backticks into a new marker, so this repeats; each pass strictly
/// shortens the text.
fn strip_fences(code: &str) -> String {
    let mut text = code.to_string();
    while text.contains(FENCE) {
        text = fence_line_pattern()
            .replace_all(&text, "")
            .replace(FENCE, "");
    }
    text
}

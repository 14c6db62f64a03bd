//! Response validation: turn raw model text into a [`GenerationResult`].
//!
//! The model is asked for a bare JSON object but frequently wraps it in
//! prose or markdown. Decoding is attempted on the full text first, then on
//! the span between the first `{` and the last `}`. Whatever decodes is
//! schema-checked before it is trusted.

use serde_json::{Map, Value};

use crate::domain::GenerationResult;

/// Accepted names for the explanation field, in lookup order.
const LOGIC_KEYS: &[&str] = &["scene_logic", "sceneLogic"];

/// Accepted names for the script field, in lookup order.
const CODE_KEYS: &[&str] = &["manim_code", "sceneCode", "scene_code"];

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// Not decodable as a JSON object.
    Malformed(String),
    /// Decoded, but a required field is absent.
    MissingField(&'static str),
    /// Decoded, but a required field is empty.
    EmptyField(&'static str),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::Malformed(reason) => write!(f, "malformed response: {}", reason),
            ParseFailure::MissingField(field) => write!(f, "missing required field `{}`", field),
            ParseFailure::EmptyField(field) => write!(f, "required field `{}` is empty", field),
        }
    }
}

/// Rejected model output.
///
/// `raw` holds the full response for diagnostics and is deliberately left
/// out of the `Display` output.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ParseError {
    pub reason: ParseFailure,
    pub raw: String,
}

impl ParseError {
    fn new(reason: ParseFailure, raw: &str) -> Self {
        Self {
            reason,
            raw: raw.to_string(),
        }
    }

    /// True when the text decoded but failed the schema check.
    pub fn is_schema_violation(&self) -> bool {
        !matches!(self.reason, ParseFailure::Malformed(_))
    }
}

/// Decode and schema-check raw model output.
pub fn validate(raw: &str) -> Result<GenerationResult, ParseError> {
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(direct_err) => {
            let span = extract_object_span(raw).ok_or_else(|| {
                ParseError::new(
                    ParseFailure::Malformed(format!("no JSON object found ({})", direct_err)),
                    raw,
                )
            })?;
            serde_json::from_str::<Value>(span)
                .map_err(|e| ParseError::new(ParseFailure::Malformed(e.to_string()), raw))?
        }
    };

    let object = as_object(&value)
        .ok_or_else(|| ParseError::new(ParseFailure::Malformed("expected a JSON object".into()), raw))?;

    decode_fields(object).map_err(|reason| ParseError::new(reason, raw))
}

/// Span from the first `{` to the last `}`, if both exist in that order.
pub fn extract_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&text[start..=end])
}

/// Top-level object, or the first object of a top-level array.
fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.iter().find_map(Value::as_object),
        _ => None,
    }
}

fn lookup<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn decode_fields(object: &Map<String, Value>) -> Result<GenerationResult, ParseFailure> {
    let logic = lookup(object, LOGIC_KEYS).ok_or(ParseFailure::MissingField("scene_logic"))?;
    let code = lookup(object, CODE_KEYS).ok_or(ParseFailure::MissingField("manim_code"))?;

    let scene_logic = match logic {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ParseFailure::Malformed("scene_logic must contain only strings".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Value::String(single) => vec![single.clone()],
        Value::Null => return Err(ParseFailure::MissingField("scene_logic")),
        _ => {
            return Err(ParseFailure::Malformed(
                "scene_logic must be an array of strings".into(),
            ))
        }
    };
    if scene_logic.iter().all(|step| step.trim().is_empty()) {
        return Err(ParseFailure::EmptyField("scene_logic"));
    }

    let scene_code = match code {
        Value::String(code) => code.clone(),
        Value::Null => return Err(ParseFailure::MissingField("manim_code")),
        _ => return Err(ParseFailure::Malformed("manim_code must be a string".into())),
    };
    if scene_code.trim().is_empty() {
        return Err(ParseFailure::EmptyField("manim_code"));
    }

    Ok(GenerationResult {
        scene_logic,
        scene_code,
    })
}

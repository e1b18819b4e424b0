//! Structural contracts for every pipeline artifact.
//!
//! Each artifact kind (Strategy, Blueprint, Recipe) gets two operations with
//! deliberately different shapes:
//!
//! - `validate_*` — a partial function. Missing required fields, wrong types,
//!   or a wrong discriminant on a tagged union fail with [`ValidationError`].
//!   Extra unknown fields never fail.
//! - `sanitize_*` — a total function. Clips strings to their maximum lengths,
//!   truncates or pads arrays to bounds, maps out-of-enum values to a safe
//!   default, and fills missing optionals. Never panics, never errors: the
//!   result is always a usable artifact, however mangled the input.
//!
//! Untrusted model output always goes through `sanitize_*`; `validate_*` is
//! for structural gates (exact slide counts, id parity) where failure routes
//! to a stage fallback instead.

pub mod blueprint;
pub mod recipe;
pub mod strategy;

pub use blueprint::{
    clamp_slide_count, sanitize_partial_slide, sanitize_slide, sanitize_theme, slide_id_for,
    validate_blueprint, Blueprint, BlueprintSlide, ContentBlock, Theme, VisualKind,
    VisualSuggestion, MAX_CONTENT_POINTS, MAX_SLIDE_COUNT, MIN_CONTENT_POINTS, MIN_SLIDE_COUNT,
};
pub use recipe::{
    default_recipe, sanitize_recipe, validate_recipe, Background, Element, GridPlacement,
    LayoutType, Recipe, GRID_COLUMNS,
};
pub use strategy::{
    dedupe_angle_ids, sanitize_angle, validate_strategy, Angle, Audience, Strategy, MAX_ANGLES,
    MIN_ANGLES,
};

use serde_json::Value;
use thiserror::Error;

/// Structural validation failure. Produced by the `validate_*` family only;
/// the `sanitize_*` family never errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required field is absent.
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    /// A field exists but has the wrong JSON type.
    #[error("field '{field}' has wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// A tagged-union discriminant was not one of the known variants.
    #[error("unknown variant '{tag}' for '{field}'")]
    UnknownVariant { field: &'static str, tag: String },

    /// A count or size bound was violated.
    #[error("bounds violation on '{field}': {detail}")]
    Bounds {
        field: &'static str,
        detail: String,
    },
}

/// Clip a string to at most `max` characters (char-boundary safe).
pub(crate) fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Read a string field, trimmed. Missing or non-string yields `None`.
pub(crate) fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read an array of strings, dropping non-string and empty entries.
pub(crate) fn str_array_field(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Require a string field for validation.
pub(crate) fn require_str(value: &Value, field: &'static str) -> Result<String, ValidationError> {
    match value.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "string",
        }),
    }
}

/// Require an array field for validation.
pub(crate) fn require_array<'a>(
    value: &'a Value,
    field: &'static str,
) -> Result<&'a Vec<Value>, ValidationError> {
    match value.get(field) {
        None | Some(Value::Null) => Err(ValidationError::MissingField(field)),
        Some(Value::Array(arr)) => Ok(arr),
        Some(_) => Err(ValidationError::WrongType {
            field,
            expected: "array",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clip_short_string_untouched() {
        assert_eq!(clip("hello", 10), "hello");
    }

    #[test]
    fn test_clip_long_string() {
        assert_eq!(clip("hello world", 5), "hello");
    }

    #[test]
    fn test_clip_multibyte_safe() {
        // Clips on char boundaries, not bytes
        assert_eq!(clip("héllo wörld", 5), "héllo");
    }

    #[test]
    fn test_str_field_trims_and_rejects_empty() {
        let v = json!({"a": "  x  ", "b": "   ", "c": 7});
        assert_eq!(str_field(&v, "a").as_deref(), Some("x"));
        assert_eq!(str_field(&v, "b"), None);
        assert_eq!(str_field(&v, "c"), None);
        assert_eq!(str_field(&v, "missing"), None);
    }

    #[test]
    fn test_str_array_field_drops_non_strings() {
        let v = json!({"items": ["a", 1, "", "b", null]});
        assert_eq!(str_array_field(&v, "items"), vec!["a", "b"]);
    }

    #[test]
    fn test_require_str_errors() {
        let v = json!({"n": 5});
        assert!(matches!(
            require_str(&v, "missing"),
            Err(ValidationError::MissingField("missing"))
        ));
        assert!(matches!(
            require_str(&v, "n"),
            Err(ValidationError::WrongType { .. })
        ));
    }

    #[test]
    fn test_require_array_errors() {
        let v = json!({"s": "not an array"});
        assert!(matches!(
            require_array(&v, "s"),
            Err(ValidationError::WrongType { .. })
        ));
    }
}

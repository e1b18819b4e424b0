//! Blueprint artifacts: the slide-by-slide presentation outline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{clip, require_array, require_str, str_array_field, str_field, ValidationError};

/// Maximum length of a slide title.
pub const SLIDE_TITLE_MAX: usize = 90;
/// Maximum length of one content point.
pub const CONTENT_POINT_MAX: usize = 180;
/// A slide carries at least this many content points.
pub const MIN_CONTENT_POINTS: usize = 2;
/// A slide carries at most this many content points.
pub const MAX_CONTENT_POINTS: usize = 5;
/// Maximum length of speaker notes.
pub const SPEAKER_NOTES_MAX: usize = 600;
/// Maximum length of a visual suggestion description.
pub const VISUAL_DESC_MAX: usize = 180;
/// Maximum number of rich content blocks per slide.
pub const MAX_BLOCKS: usize = 3;
/// Lower bound on a blueprint's slide count (enforced server-side).
pub const MIN_SLIDE_COUNT: u32 = 3;
/// Upper bound on a blueprint's slide count (enforced server-side).
pub const MAX_SLIDE_COUNT: u32 = 15;
/// Theme palettes are bounded to this many colors.
pub const THEME_PALETTE_MAX: usize = 6;
/// Theme mood keyword bound.
pub const THEME_MOOD_MAX: usize = 5;

/// Clamp a requested slide count into the allowed range, regardless of
/// client input.
pub fn clamp_slide_count(requested: u32) -> u32 {
    requested.clamp(MIN_SLIDE_COUNT, MAX_SLIDE_COUNT)
}

/// Stable slide id for a 1-based index: `s-01`, `s-02`, ...
pub fn slide_id_for(index: u32) -> String {
    format!("s-{:02}", index)
}

/// Kind of visual suggested for a slide. Unknown values sanitize to `Image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Image,
    Diagram,
    Table,
    Quote,
    Chart,
}

impl VisualKind {
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "diagram" => VisualKind::Diagram,
            "table" => VisualKind::Table,
            "quote" => VisualKind::Quote,
            "chart" | "graph" => VisualKind::Chart,
            _ => VisualKind::Image,
        }
    }
}

/// A suggested visual for a slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualSuggestion {
    #[serde(rename = "type")]
    pub kind: VisualKind,
    pub description: String,
}

/// Richer per-slide content, beyond plain bullet points.
///
/// The discriminant is closed: validation fails on an unknown `type` tag,
/// and sanitization drops blocks it cannot interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    BulletPoints {
        items: Vec<String>,
    },
    Paragraph {
        text: String,
    },
    Statistic {
        value: String,
        label: String,
    },
    Quote {
        text: String,
        #[serde(default)]
        attribution: Option<String>,
    },
    Callout {
        text: String,
    },
    ImageRequest {
        description: String,
    },
    DiagramRequest {
        description: String,
    },
    TableRequest {
        description: String,
    },
}

/// Design-system descriptor attached to a blueprint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Theme {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub typography: Option<String>,
    #[serde(default)]
    pub mood_keywords: Vec<String>,
}

/// One slide of the outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintSlide {
    /// Stable across refinement edits; format `s-NN`.
    pub slide_id: String,
    /// 1-based; matches array position.
    pub slide_index: u32,
    pub slide_title: String,
    pub content_points: Vec<String>,
    #[serde(default)]
    pub speaker_notes: Option<String>,
    #[serde(default)]
    pub visual_suggestion: Option<VisualSuggestion>,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

/// The full presentation outline produced by the Blueprint stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub topic: String,
    pub chosen_angle: super::Angle,
    pub slide_count: u32,
    #[serde(default)]
    pub theme: Option<Theme>,
    pub slides: Vec<BlueprintSlide>,
}

fn sanitize_visual(value: &Value) -> Option<VisualSuggestion> {
    let obj = value.as_object()?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(VisualKind::from_loose)
        .unwrap_or(VisualKind::Image);
    let description = str_field(value, "description")?;
    Some(VisualSuggestion {
        kind,
        description: clip(&description, VISUAL_DESC_MAX),
    })
}

/// Pull bounded, known-variant content blocks out of an untrusted object's
/// `blocks` array.
pub(crate) fn sanitize_blocks(value: &Value) -> Vec<ContentBlock> {
    value
        .get("blocks")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|b| serde_json::from_value::<ContentBlock>(b.clone()).ok())
                .take(MAX_BLOCKS)
                .collect()
        })
        .unwrap_or_default()
}

/// Sanitize one untrusted slide object into a complete, bounded slide.
///
/// Total: missing titles get a placeholder, content points are clipped and
/// padded up to [`MIN_CONTENT_POINTS`], the id is normalized to `s-NN` for
/// the given 1-based index.
pub fn sanitize_slide(value: &Value, index: u32) -> BlueprintSlide {
    let slide_title = str_field(value, "slide_title")
        .or_else(|| str_field(value, "title"))
        .map(|t| clip(&t, SLIDE_TITLE_MAX))
        .unwrap_or_else(|| format!("Slide {}", index));

    let mut content_points: Vec<String> = str_array_field(value, "content_points")
        .into_iter()
        .take(MAX_CONTENT_POINTS)
        .map(|p| clip(&p, CONTENT_POINT_MAX))
        .collect();
    while content_points.len() < MIN_CONTENT_POINTS {
        content_points.push(format!("Key point {}", content_points.len() + 1));
    }

    let speaker_notes = str_field(value, "speaker_notes").map(|n| clip(&n, SPEAKER_NOTES_MAX));

    BlueprintSlide {
        slide_id: slide_id_for(index),
        slide_index: index,
        slide_title,
        content_points,
        speaker_notes,
        visual_suggestion: value.get("visual_suggestion").and_then(sanitize_visual),
        blocks: sanitize_blocks(value),
    }
}

/// Sanitize a possibly-incomplete slide object accumulating field-by-field
/// during streaming.
///
/// Unlike [`sanitize_slide`], this does not pad content points (the slide
/// may legitimately still be short) and keeps whatever `slide_index` the
/// object declares, falling back to `fallback_index`. Returns `None` only
/// when the object is unusable: not an object, or carrying neither a title
/// nor any content points. Unknown extra fields never fail.
pub fn sanitize_partial_slide(value: &Value, fallback_index: u32) -> Option<BlueprintSlide> {
    if !value.is_object() {
        return None;
    }

    let title = str_field(value, "slide_title").or_else(|| str_field(value, "title"));
    let points = str_array_field(value, "content_points");
    if title.is_none() && points.is_empty() {
        return None;
    }

    let index = value
        .get("slide_index")
        .and_then(Value::as_u64)
        .map(|n| n as u32)
        .filter(|n| *n >= 1)
        .unwrap_or(fallback_index);

    Some(BlueprintSlide {
        slide_id: str_field(value, "slide_id").unwrap_or_else(|| slide_id_for(index)),
        slide_index: index,
        slide_title: title
            .map(|t| clip(&t, SLIDE_TITLE_MAX))
            .unwrap_or_else(|| format!("Slide {}", index)),
        content_points: points
            .into_iter()
            .take(MAX_CONTENT_POINTS)
            .map(|p| clip(&p, CONTENT_POINT_MAX))
            .collect(),
        speaker_notes: str_field(value, "speaker_notes").map(|n| clip(&n, SPEAKER_NOTES_MAX)),
        visual_suggestion: value.get("visual_suggestion").and_then(sanitize_visual),
        blocks: sanitize_blocks(value),
    })
}

/// Sanitize an untrusted theme object. Absent or unusable input yields `None`
/// (the theme is optional end-to-end).
pub fn sanitize_theme(value: &Value) -> Option<Theme> {
    if !value.is_object() {
        return None;
    }
    let palette: Vec<String> = str_array_field(value, "palette")
        .into_iter()
        .take(THEME_PALETTE_MAX)
        .collect();
    let typography = str_field(value, "typography");
    let mood_keywords: Vec<String> = str_array_field(value, "mood_keywords")
        .into_iter()
        .take(THEME_MOOD_MAX)
        .collect();
    // A theme with nothing in it carries no information.
    if palette.is_empty() && typography.is_none() && mood_keywords.is_empty() {
        return None;
    }
    Some(Theme {
        palette,
        typography,
        mood_keywords,
    })
}

/// Structural validation of a raw blueprint candidate: `topic` string and a
/// `slides` array whose entries each carry a string title.
pub fn validate_blueprint(value: &Value) -> Result<(), ValidationError> {
    require_str(value, "topic")?;
    let slides = require_array(value, "slides")?;
    for slide in slides {
        if str_field(slide, "slide_title").is_none() && str_field(slide, "title").is_none() {
            return Err(ValidationError::MissingField("slide_title"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clamp_slide_count() {
        assert_eq!(clamp_slide_count(1), 3);
        assert_eq!(clamp_slide_count(3), 3);
        assert_eq!(clamp_slide_count(8), 8);
        assert_eq!(clamp_slide_count(15), 15);
        assert_eq!(clamp_slide_count(37), 15);
    }

    #[test]
    fn test_slide_id_format() {
        assert_eq!(slide_id_for(1), "s-01");
        assert_eq!(slide_id_for(12), "s-12");
    }

    #[test]
    fn test_sanitize_slide_complete() {
        let v = json!({
            "slide_title": "Why it matters",
            "content_points": ["Cost", "Speed", "Trust"],
            "speaker_notes": "Linger here.",
            "visual_suggestion": {"type": "chart", "description": "Cost over time"},
        });
        let slide = sanitize_slide(&v, 2);
        assert_eq!(slide.slide_id, "s-02");
        assert_eq!(slide.slide_index, 2);
        assert_eq!(slide.content_points.len(), 3);
        assert_eq!(
            slide.visual_suggestion.as_ref().unwrap().kind,
            VisualKind::Chart
        );
    }

    #[test]
    fn test_sanitize_slide_pads_points() {
        let v = json!({"slide_title": "Sparse", "content_points": ["only one"]});
        let slide = sanitize_slide(&v, 1);
        assert_eq!(slide.content_points.len(), MIN_CONTENT_POINTS);
    }

    #[test]
    fn test_sanitize_slide_truncates_points() {
        let points: Vec<String> = (0..9).map(|i| format!("p{}", i)).collect();
        let v = json!({"slide_title": "Busy", "content_points": points});
        let slide = sanitize_slide(&v, 1);
        assert_eq!(slide.content_points.len(), MAX_CONTENT_POINTS);
    }

    #[test]
    fn test_sanitize_slide_accepts_title_alias() {
        let v = json!({"title": "Alias", "content_points": ["a", "b"]});
        assert_eq!(sanitize_slide(&v, 1).slide_title, "Alias");
    }

    #[test]
    fn test_sanitize_slide_total_on_garbage() {
        let slide = sanitize_slide(&json!("nonsense"), 4);
        assert_eq!(slide.slide_id, "s-04");
        assert_eq!(slide.slide_title, "Slide 4");
        assert_eq!(slide.content_points.len(), MIN_CONTENT_POINTS);
    }

    #[test]
    fn test_sanitize_slide_drops_unknown_block_types() {
        let v = json!({
            "slide_title": "Blocks",
            "content_points": ["a", "b"],
            "blocks": [
                {"type": "callout", "text": "Look!"},
                {"type": "hologram", "text": "??"},
                {"type": "statistic", "value": "42%", "label": "growth"},
            ],
        });
        let slide = sanitize_slide(&v, 1);
        assert_eq!(slide.blocks.len(), 2);
        assert!(matches!(slide.blocks[0], ContentBlock::Callout { .. }));
        assert!(matches!(slide.blocks[1], ContentBlock::Statistic { .. }));
    }

    #[test]
    fn test_sanitize_slide_bounds_blocks() {
        let v = json!({
            "slide_title": "B",
            "content_points": ["a", "b"],
            "blocks": [
                {"type": "callout", "text": "1"},
                {"type": "callout", "text": "2"},
                {"type": "callout", "text": "3"},
                {"type": "callout", "text": "4"},
            ],
        });
        assert_eq!(sanitize_slide(&v, 1).blocks.len(), MAX_BLOCKS);
    }

    #[test]
    fn test_partial_slide_accepts_missing_fields() {
        let v = json!({"slide_title": "Early"});
        let slide = sanitize_partial_slide(&v, 3).unwrap();
        assert_eq!(slide.slide_title, "Early");
        // Partial slides are not padded
        assert!(slide.content_points.is_empty());
        assert_eq!(slide.slide_index, 3);
    }

    #[test]
    fn test_partial_slide_prefers_declared_index() {
        let v = json!({"slide_title": "T", "slide_index": 7});
        let slide = sanitize_partial_slide(&v, 1).unwrap();
        assert_eq!(slide.slide_index, 7);
        assert_eq!(slide.slide_id, "s-07");
    }

    #[test]
    fn test_partial_slide_rejects_unusable() {
        assert!(sanitize_partial_slide(&json!({"other": 1}), 1).is_none());
        assert!(sanitize_partial_slide(&json!([1, 2]), 1).is_none());
    }

    #[test]
    fn test_partial_slide_tolerates_unknown_fields() {
        let v = json!({"slide_title": "T", "internal_confidence": 0.3});
        assert!(sanitize_partial_slide(&v, 1).is_some());
    }

    #[test]
    fn test_sanitize_theme() {
        let v = json!({"palette": ["#112233", "#445566"], "mood_keywords": ["calm"]});
        let theme = sanitize_theme(&v).unwrap();
        assert_eq!(theme.palette.len(), 2);
        assert_eq!(theme.mood_keywords, vec!["calm"]);
    }

    #[test]
    fn test_sanitize_theme_unusable() {
        assert!(sanitize_theme(&json!({"irrelevant": true})).is_none());
        assert!(sanitize_theme(&json!("plain")).is_none());
        assert!(sanitize_theme(&json!({})).is_none());
        assert!(sanitize_theme(&json!({"palette": [], "mood_keywords": []})).is_none());
    }

    #[test]
    fn test_validate_blueprint() {
        let v = json!({"topic": "T", "slides": [{"slide_title": "A"}]});
        assert!(validate_blueprint(&v).is_ok());

        let v = json!({"slides": []});
        assert!(validate_blueprint(&v).is_err());

        let v = json!({"topic": "T", "slides": [{"notes": "no title"}]});
        assert!(validate_blueprint(&v).is_err());
    }

    #[test]
    fn test_content_block_wire_format() {
        let block = ContentBlock::Statistic {
            value: "3x".into(),
            label: "throughput".into(),
        };
        let v = serde_json::to_value(&block).unwrap();
        assert_eq!(v["type"], "statistic");
        let back: ContentBlock = serde_json::from_value(v).unwrap();
        assert_eq!(back, block);
    }
}

//! Strategy artifacts: candidate narrative angles for a topic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{clip, require_array, require_str, str_array_field, str_field, ValidationError};

/// Maximum length of an `angle_id`.
pub const ANGLE_ID_MAX: usize = 40;
/// Maximum length of an angle title.
pub const ANGLE_TITLE_MAX: usize = 80;
/// Maximum length of an angle description.
pub const ANGLE_DESC_MAX: usize = 280;
/// Maximum number of emphasis keywords per angle.
pub const EMPHASIS_KEYWORDS_MAX: usize = 7;
/// A Strategy carries at least this many angles.
pub const MIN_ANGLES: usize = 2;
/// A Strategy carries at most this many angles.
pub const MAX_ANGLES: usize = 3;

/// The audience an angle is framed for. Closed set; unknown values
/// sanitize to [`Audience::General`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    General,
    Executives,
    Technical,
    Students,
    Investors,
}

impl Audience {
    /// Map an untrusted string to an audience. Out-of-enum values become
    /// `General` rather than failing.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "executives" | "executive" | "leadership" => Audience::Executives,
            "technical" | "engineers" | "developers" => Audience::Technical,
            "students" | "academic" => Audience::Students,
            "investors" | "vcs" => Audience::Investors,
            _ => Audience::General,
        }
    }
}

impl Default for Audience {
    fn default() -> Self {
        Audience::General
    }
}

/// A candidate narrative strategy for a presentation topic.
///
/// Generated once per Strategy call and immutable afterward; the Blueprint
/// references the chosen angle by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    /// Unique within a Strategy response.
    pub angle_id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub emphasis_keywords: Vec<String>,
}

/// The Strategist stage's output: 2–3 ordered angles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub angles: Vec<Angle>,
}

/// Derive a stable id slug from free text (lowercase, hyphenated, bounded).
pub(crate) fn slugify(text: &str) -> String {
    let slug: String = text
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let collapsed = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    clip(&collapsed, ANGLE_ID_MAX)
}

/// Sanitize one untrusted angle object. Total: always yields an `Angle`.
///
/// Missing ids are derived from the title; missing titles get a generic
/// placeholder so downstream stages never see empty required fields.
pub fn sanitize_angle(value: &Value) -> Angle {
    let title = str_field(value, "title").unwrap_or_else(|| "Untitled angle".to_string());
    let title = clip(&title, ANGLE_TITLE_MAX);

    let angle_id = str_field(value, "angle_id")
        .map(|id| clip(&id, ANGLE_ID_MAX))
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| slugify(&title));
    let angle_id = if angle_id.is_empty() {
        "angle".to_string()
    } else {
        angle_id
    };

    let description = str_field(value, "description")
        .map(|d| clip(&d, ANGLE_DESC_MAX))
        .unwrap_or_default();

    let audience = str_field(value, "audience")
        .map(|a| Audience::from_loose(&a))
        .unwrap_or_default();

    let emphasis_keywords = str_array_field(value, "emphasis_keywords")
        .into_iter()
        .take(EMPHASIS_KEYWORDS_MAX)
        .map(|k| clip(&k, ANGLE_TITLE_MAX))
        .collect();

    Angle {
        angle_id,
        title,
        description,
        audience,
        emphasis_keywords,
    }
}

/// Validate a raw Strategy candidate: must carry an `angles` array of at
/// least [`MIN_ANGLES`] objects, each with string `angle_id` and `title`.
/// Unknown extra fields are ignored.
pub fn validate_strategy(value: &Value) -> Result<(), ValidationError> {
    // Accept either a bare array or an object with an "angles" key.
    let angles = match value.as_array() {
        Some(arr) => arr,
        None => require_array(value, "angles")?,
    };

    if angles.len() < MIN_ANGLES {
        return Err(ValidationError::Bounds {
            field: "angles",
            detail: format!("expected at least {}, got {}", MIN_ANGLES, angles.len()),
        });
    }

    for angle in angles {
        require_str(angle, "angle_id")?;
        require_str(angle, "title")?;
    }

    Ok(())
}

/// Make every `angle_id` in the list pairwise distinct by appending a
/// numeric suffix on collision (`growth`, `growth-2`, `growth-3`, ...).
/// The base is shortened so the suffixed id stays within [`ANGLE_ID_MAX`];
/// clipping after the uniqueness check could silently restore a duplicate.
pub fn dedupe_angle_ids(angles: &mut [Angle]) {
    let mut seen: Vec<String> = Vec::with_capacity(angles.len());
    for angle in angles.iter_mut() {
        if seen.contains(&angle.angle_id) {
            let mut n = 2;
            loop {
                let suffix = format!("-{}", n);
                let base = clip(&angle.angle_id, ANGLE_ID_MAX - suffix.len());
                let candidate = format!("{}{}", base, suffix);
                if !seen.contains(&candidate) {
                    angle.angle_id = candidate;
                    break;
                }
                n += 1;
            }
        }
        seen.push(angle.angle_id.clone());
    }
}

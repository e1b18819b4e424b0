//! Recipe artifacts: the renderable layout composition for one slide.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::blueprint::BlueprintSlide;
use super::{clip, require_array, require_str, str_field, ValidationError};

/// The layout grid is 12 columns wide.
pub const GRID_COLUMNS: u32 = 12;
/// Placements use at most this many rows.
pub const GRID_ROWS: u32 = 12;
/// Maximum number of elements on one slide recipe.
pub const MAX_ELEMENTS: usize = 8;
/// Maximum number of style hints per element.
pub const MAX_STYLE_HINTS: usize = 4;

/// Named layout templates. Unknown values sanitize to `TitleContent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    TitleContent,
    TwoColumn,
    FullBleed,
    QuoteSpotlight,
    DataFocus,
    Comparison,
}

impl LayoutType {
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "two_column" | "twocolumn" | "split" => LayoutType::TwoColumn,
            "full_bleed" | "fullbleed" | "hero" => LayoutType::FullBleed,
            "quote_spotlight" | "quote" => LayoutType::QuoteSpotlight,
            "data_focus" | "data" | "stat" => LayoutType::DataFocus,
            "comparison" | "versus" => LayoutType::Comparison,
            _ => LayoutType::TitleContent,
        }
    }
}

/// Placement on the 12-column grid. Serialized with the camelCase names the
/// renderer expects (`colStart`, `colEnd`, `rowStart`, `rowEnd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPlacement {
    pub col_start: u32,
    pub col_end: u32,
    pub row_start: u32,
    pub row_end: u32,
}

impl GridPlacement {
    /// Clamp coordinates into the grid and fix inverted ranges.
    pub fn clamped(self) -> Self {
        let col_start = self.col_start.clamp(1, GRID_COLUMNS);
        let col_end = self.col_end.clamp(col_start, GRID_COLUMNS + 1).max(col_start + 1);
        let row_start = self.row_start.clamp(1, GRID_ROWS);
        let row_end = self.row_end.clamp(row_start, GRID_ROWS + 1).max(row_start + 1);
        Self {
            col_start,
            col_end,
            row_start,
            row_end,
        }
    }

    /// Full-width placement for a given row band.
    pub fn full_width(row_start: u32, row_end: u32) -> Self {
        Self {
            col_start: 1,
            col_end: GRID_COLUMNS + 1,
            row_start,
            row_end,
        }
    }
}

/// Slide background: a flat color plus an optional generative descriptor
/// handed to an external rendering service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub color: String,
    #[serde(default)]
    pub generative_background: Option<String>,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            color: "#FFFFFF".to_string(),
            generative_background: None,
        }
    }
}

/// A typed visual element. The `type` tag is a closed discriminant:
/// validation fails on unknown tags; sanitization drops such elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Element {
    Title {
        text: String,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    BulletedList {
        items: Vec<String>,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Paragraph {
        text: String,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Quote {
        text: String,
        #[serde(default)]
        attribution: Option<String>,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Stat {
        value: String,
        label: String,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Image {
        description: String,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Diagram {
        description: String,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        #[serde(default)]
        placement: Option<GridPlacement>,
        #[serde(default)]
        style_hints: Vec<String>,
    },
}

impl Element {
    fn placement_mut(&mut self) -> &mut Option<GridPlacement> {
        match self {
            Element::Title { placement, .. }
            | Element::BulletedList { placement, .. }
            | Element::Paragraph { placement, .. }
            | Element::Quote { placement, .. }
            | Element::Stat { placement, .. }
            | Element::Image { placement, .. }
            | Element::Diagram { placement, .. }
            | Element::Table { placement, .. } => placement,
        }
    }

    fn style_hints_mut(&mut self) -> &mut Vec<String> {
        match self {
            Element::Title { style_hints, .. }
            | Element::BulletedList { style_hints, .. }
            | Element::Paragraph { style_hints, .. }
            | Element::Quote { style_hints, .. }
            | Element::Stat { style_hints, .. }
            | Element::Image { style_hints, .. }
            | Element::Diagram { style_hints, .. }
            | Element::Table { style_hints, .. } => style_hints,
        }
    }
}

/// The renderable form of one blueprint slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Must reference an existing blueprint slide id.
    pub slide_id: String,
    pub layout_type: LayoutType,
    #[serde(default)]
    pub background: Background,
    pub elements: Vec<Element>,
}

/// Sanitize one untrusted recipe object. Total: drops elements with unknown
/// discriminants, clamps grid placements, bounds style hints, and falls back
/// to `fallback_slide_id` when the id is missing.
pub fn sanitize_recipe(value: &Value, fallback_slide_id: &str) -> Recipe {
    let slide_id = str_field(value, "slide_id").unwrap_or_else(|| fallback_slide_id.to_string());

    let layout_type = str_field(value, "layout_type")
        .map(|l| LayoutType::from_loose(&l))
        .unwrap_or(LayoutType::TitleContent);

    let background = value
        .get("background")
        .map(|b| Background {
            color: str_field(b, "color").unwrap_or_else(|| Background::default().color),
            generative_background: str_field(b, "generative_background"),
        })
        .unwrap_or_default();

    let mut elements: Vec<Element> = value
        .get("elements")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|e| serde_json::from_value::<Element>(e.clone()).ok())
                .take(MAX_ELEMENTS)
                .collect()
        })
        .unwrap_or_default();

    for element in &mut elements {
        if let Some(p) = element.placement_mut() {
            *p = p.clamped();
        }
        let hints = element.style_hints_mut();
        hints.truncate(MAX_STYLE_HINTS);
        for hint in hints.iter_mut() {
            *hint = clip(hint, 60);
        }
    }

    Recipe {
        slide_id,
        layout_type,
        background,
        elements,
    }
}

/// Structural validation of a raw recipe candidate: string `slide_id` and an
/// `elements` array whose every entry deserializes into a known [`Element`]
/// variant. A wrong discriminant fails; unknown extra fields do not.
pub fn validate_recipe(value: &Value) -> Result<(), ValidationError> {
    require_str(value, "slide_id")?;
    let elements = require_array(value, "elements")?;
    for element in elements {
        if serde_json::from_value::<Element>(element.clone()).is_err() {
            let tag = element
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("<missing>")
                .to_string();
            return Err(ValidationError::UnknownVariant {
                field: "elements",
                tag,
            });
        }
    }
    Ok(())
}

/// The deterministic fallback recipe: title on top, bulleted list below,
/// built from the blueprint slide's own content. Used when the Recipe
/// Composer's model output fails count or id-set validation.
pub fn default_recipe(slide: &BlueprintSlide) -> Recipe {
    Recipe {
        slide_id: slide.slide_id.clone(),
        layout_type: LayoutType::TitleContent,
        background: Background::default(),
        elements: vec![
            Element::Title {
                text: slide.slide_title.clone(),
                placement: Some(GridPlacement::full_width(1, 3)),
                style_hints: Vec::new(),
            },
            Element::BulletedList {
                items: slide.content_points.clone(),
                placement: Some(GridPlacement::full_width(3, 11)),
                style_hints: Vec::new(),
            },
        ],
    }
}

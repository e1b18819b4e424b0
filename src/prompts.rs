//! Prompt construction for every pipeline stage.
//!
//! Prompts are built from typed artifacts, never from raw user templates;
//! the only free text that reaches a prompt is the topic and the refinement
//! instructions, both of which are data to the model rather than directives
//! to this crate. Each builder returns a `(system, user)` pair.

use serde_json::json;

use crate::schema::{
    Angle, Blueprint, MAX_ANGLES, MAX_CONTENT_POINTS, MIN_ANGLES, MIN_CONTENT_POINTS,
};

/// Cap on the chat history lines included in a refinement prompt.
pub const REFINE_HISTORY_MAX: usize = 20;

/// Closed set of prompt styles. Unknown strings parse to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptVariant {
    #[default]
    Default,
    Creative,
    Concise,
    Analytical,
}

impl PromptVariant {
    /// Parse a loose variant string. Anything unrecognized is `Default`;
    /// never an error, so a bad client value cannot break a run.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "creative" => PromptVariant::Creative,
            "concise" => PromptVariant::Concise,
            "analytical" => PromptVariant::Analytical,
            _ => PromptVariant::Default,
        }
    }

    /// Style preamble appended to a stage's system prompt.
    pub fn preamble(self) -> &'static str {
        match self {
            PromptVariant::Default => "",
            PromptVariant::Creative => {
                "Favor bold, unexpected framings and vivid language over safe choices."
            }
            PromptVariant::Concise => {
                "Be ruthless about brevity. Short titles, short points, no filler."
            }
            PromptVariant::Analytical => {
                "Favor evidence, numbers, and causal structure over narrative color."
            }
        }
    }
}

fn with_preamble(base: &str, variant: PromptVariant) -> String {
    let preamble = variant.preamble();
    if preamble.is_empty() {
        base.to_string()
    } else {
        format!("{}\n{}", base, preamble)
    }
}

/// One line summarizing an angle inside a larger prompt.
fn angle_line(angle: &Angle) -> String {
    let mut line = format!("\"{}\" ({})", angle.title, angle.angle_id);
    if !angle.description.is_empty() {
        line.push_str(": ");
        line.push_str(&angle.description);
    }
    if !angle.emphasis_keywords.is_empty() {
        line.push_str(" [emphasize: ");
        line.push_str(&angle.emphasis_keywords.join(", "));
        line.push(']');
    }
    line
}

/// Prompt for the Strategist stage: 2-3 candidate angles as a JSON array.
pub fn strategist(topic: &str, variant: PromptVariant) -> (String, String) {
    let system = with_preamble(
        "You are a presentation strategist. You propose distinct narrative \
         angles for a deck, each aimed at a clear audience. Respond with JSON \
         only, no prose.",
        variant,
    );
    let user = format!(
        "Topic: {topic}\n\n\
         Propose between {MIN_ANGLES} and {MAX_ANGLES} distinct angles for a \
         presentation on this topic. Return a JSON array where each entry has:\n\
         - \"angle_id\": short kebab-case slug\n\
         - \"title\": angle title\n\
         - \"description\": one or two sentences on the framing\n\
         - \"audience\": one of general, executives, technical, students, investors\n\
         - \"emphasis_keywords\": up to 7 keywords to stress\n\n\
         The angles must differ in framing, not just wording."
    );
    (system, user)
}

/// Prompt for the Blueprint Builder: a full outline with exactly
/// `slide_count` slides plus a theme.
pub fn blueprint(
    topic: &str,
    angle: &Angle,
    slide_count: u32,
    variant: PromptVariant,
) -> (String, String) {
    let system = with_preamble(
        "You are a presentation outline writer. You turn a topic and a chosen \
         narrative angle into a complete slide-by-slide outline. Respond with \
         JSON only, no prose.",
        variant,
    );
    let user = format!(
        "Topic: {topic}\n\
         Chosen angle: {}\n\n\
         Write an outline with exactly {slide_count} slides. Return a JSON \
         object with:\n\
         - \"topic\": the topic\n\
         - \"theme\": {{\"palette\": [hex colors], \"typography\": string, \
         \"mood_keywords\": [strings]}}\n\
         - \"slides\": array of exactly {slide_count} objects, each with:\n\
           - \"slide_index\": 1-based position\n\
           - \"slide_title\": short title\n\
           - \"content_points\": {MIN_CONTENT_POINTS} to {MAX_CONTENT_POINTS} \
         concise points\n\
           - \"speaker_notes\": what the presenter should say\n\
           - \"visual_suggestion\": {{\"type\": one of image, diagram, table, \
         quote, chart; \"description\": what to show}}\n\n\
         The first slide introduces the topic; the last slide concludes.",
        angle_line(angle),
    );
    (system, user)
}

/// Prompt for the streaming Blueprint variant: same outline, but one JSON
/// object per slide concatenated back to back, so slides can be parsed as
/// they arrive.
pub fn blueprint_streaming(
    topic: &str,
    angle: &Angle,
    slide_count: u32,
    variant: PromptVariant,
) -> (String, String) {
    let system = with_preamble(
        "You are a presentation outline writer. You emit one JSON object per \
         slide, concatenated with no separator, no array brackets, and no \
         prose before, between, or after the objects.",
        variant,
    );
    let user = format!(
        "Topic: {topic}\n\
         Chosen angle: {}\n\n\
         Emit exactly {slide_count} slide objects back to back. Each object \
         has \"slide_index\" (1-based), \"slide_title\", \"content_points\" \
         ({MIN_CONTENT_POINTS} to {MAX_CONTENT_POINTS} concise points), \
         \"speaker_notes\", and \"visual_suggestion\" {{\"type\", \
         \"description\"}}. The first slide introduces the topic; the last \
         concludes. Do not wrap the objects in an array.",
        angle_line(angle),
    );
    (system, user)
}

/// Prompt for the Blueprint Refiner: the full current outline, recent chat
/// history, and the user's instructions; asks for the full updated outline.
pub fn refine(blueprint: &Blueprint, history: &[String], instructions: &str) -> (String, String) {
    let system = "You are a presentation editor. You apply the user's requested \
                  changes to an existing outline and return the complete \
                  updated outline as JSON only, no prose. Keep every \
                  \"slide_id\" exactly as given, keep the slide count the \
                  same, and leave slides the user did not mention untouched. \
                  A target like \"@slide2\" refers to the slide with \
                  slide_index 2."
        .to_string();

    let mut user = String::new();
    user.push_str("Current outline:\n");
    user.push_str(
        &serde_json::to_string_pretty(&json!({
            "topic": blueprint.topic,
            "slide_count": blueprint.slide_count,
            "slides": blueprint.slides,
        }))
        .unwrap_or_default(),
    );

    let recent: Vec<&String> = history
        .iter()
        .rev()
        .take(REFINE_HISTORY_MAX)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if !recent.is_empty() {
        user.push_str("\n\nRecent conversation:\n");
        for line in recent {
            user.push_str("- ");
            user.push_str(line);
            user.push('\n');
        }
    }

    user.push_str("\nRequested changes:\n");
    user.push_str(instructions);
    user.push_str(
        "\n\nReturn the full updated outline as a JSON object with \"topic\" \
         and \"slides\", same slide count and same slide_ids.",
    );
    (system, user)
}

/// Prompt for the Recipe Composer: one layout recipe per slide on the
/// 12-column grid, from the closed element vocabulary.
pub fn recipes(blueprint: &Blueprint) -> (String, String) {
    let system = "You are a slide layout designer working on a 12-column, \
                  12-row grid. You compose each slide from a fixed element \
                  vocabulary and respond with JSON only, no prose."
        .to_string();

    let theme_note = blueprint
        .theme
        .as_ref()
        .and_then(|t| serde_json::to_string(t).ok())
        .map(|t| format!("Theme: {}\n", t))
        .unwrap_or_default();

    let slides = serde_json::to_string_pretty(&blueprint.slides).unwrap_or_default();

    let user = format!(
        "Topic: {}\n{theme_note}\
         Slides:\n{slides}\n\n\
         Return a JSON array with exactly one recipe per slide, in slide \
         order. Each recipe has:\n\
         - \"slide_id\": copied from the slide\n\
         - \"layout_type\": one of title_content, two_column, full_bleed, \
         quote_spotlight, data_focus, comparison\n\
         - \"background\": {{\"color\": hex, \"generative_background\": \
         optional scene description}}\n\
         - \"elements\": array of typed elements; \"type\" is one of title, \
         bulleted_list, paragraph, quote, stat, image, diagram, table. Each \
         element may carry \"placement\" {{\"colStart\", \"colEnd\", \
         \"rowStart\", \"rowEnd\"}} on the 12x12 grid (columns 1-12, end \
         exclusive up to 13) and up to 4 \"style_hints\".\n\n\
         Every slide_id from the input must appear exactly once.",
        blueprint.topic,
    );
    (system, user)
}

/// Prompt for per-slide content expansion: rich blocks for one slide.
pub fn slide_content(topic: &str, slide_title: &str, content_points: &[String]) -> (String, String) {
    let system = "You are a presentation content writer. You expand a slide \
                  outline into rich content blocks. Respond with JSON only, \
                  no prose."
        .to_string();
    let user = format!(
        "Topic: {topic}\n\
         Slide: {slide_title}\n\
         Points:\n{}\n\n\
         Return a JSON object with a \"blocks\" array of at most 3 blocks. \
         Each block has a \"type\" of bullet_points, paragraph, statistic, \
         quote, callout, image_request, diagram_request, or table_request, \
         with the matching fields (items / text / value+label / \
         text+attribution / description).",
        content_points
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Audience;

    fn test_angle() -> Angle {
        Angle {
            angle_id: "cost-story".into(),
            title: "The Cost Story".into(),
            description: "Follow the money.".into(),
            audience: Audience::Executives,
            emphasis_keywords: vec!["savings".into()],
        }
    }

    #[test]
    fn test_variant_from_loose() {
        assert_eq!(PromptVariant::from_loose("Creative"), PromptVariant::Creative);
        assert_eq!(PromptVariant::from_loose("CONCISE"), PromptVariant::Concise);
        assert_eq!(PromptVariant::from_loose("mystery"), PromptVariant::Default);
        assert_eq!(PromptVariant::from_loose(""), PromptVariant::Default);
    }

    #[test]
    fn test_default_variant_adds_nothing() {
        let (system, _) = strategist("rust", PromptVariant::Default);
        assert!(!system.contains('\n'));
    }

    #[test]
    fn test_variant_preamble_appended() {
        let (system, _) = strategist("rust", PromptVariant::Concise);
        assert!(system.contains("brevity"));
    }

    #[test]
    fn test_strategist_mentions_bounds() {
        let (_, user) = strategist("quantum computing", PromptVariant::Default);
        assert!(user.contains("between 2 and 3"));
        assert!(user.contains("quantum computing"));
    }

    #[test]
    fn test_blueprint_demands_exact_count() {
        let (_, user) = blueprint("rust", &test_angle(), 7, PromptVariant::Default);
        assert!(user.contains("exactly 7 slides"));
        assert!(user.contains("cost-story"));
        assert!(user.contains("savings"));
    }

    #[test]
    fn test_streaming_prompt_forbids_array() {
        let (system, user) = blueprint_streaming("rust", &test_angle(), 5, PromptVariant::Default);
        assert!(system.contains("no separator"));
        assert!(user.contains("Do not wrap the objects in an array"));
    }

    #[test]
    fn test_refine_caps_history() {
        let bp = crate::stages::synthetic_blueprint("t", &test_angle(), 3);
        let history: Vec<String> = (0..40).map(|i| format!("message {}", i)).collect();
        let (_, user) = refine(&bp, &history, "tighten slide 2");

        // Only the most recent window appears
        assert!(user.contains("message 39"));
        assert!(user.contains("message 20"));
        assert!(!user.contains("message 19\n"));
        assert!(user.contains("tighten slide 2"));
    }

    #[test]
    fn test_recipes_lists_vocabulary() {
        let bp = crate::stages::synthetic_blueprint("t", &test_angle(), 3);
        let (_, user) = recipes(&bp);
        assert!(user.contains("bulleted_list"));
        assert!(user.contains("colStart"));
        assert!(user.contains("s-01"));
    }

    #[test]
    fn test_slide_content_includes_points() {
        let (_, user) = slide_content("rust", "Memory safety", &["no GC".into(), "borrows".into()]);
        assert!(user.contains("- no GC"));
        assert!(user.contains("Memory safety"));
    }
}

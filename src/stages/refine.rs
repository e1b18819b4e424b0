//! Blueprint Refiner stage: conversational edits to an existing outline.
//!
//! The refiner is strictly no-op-on-doubt: any reply it cannot trust in
//! full (unparseable, wrong slide count) leaves the input outline unchanged.
//! A partial edit is worse than no edit, because the caller's slide ids and
//! ordering are load-bearing for everything downstream.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::gateway::{Gateway, GatewayCall, GatewayContent};
use crate::prompts;
use crate::schema::{sanitize_slide, sanitize_theme, str_field, Blueprint};
use crate::PipelineError;

/// Applies free-text edit instructions to an existing blueprint.
pub struct Refiner {
    gateway: Arc<Gateway>,
}

impl Refiner {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Apply `instructions` to `blueprint`, with the last
    /// [`prompts::REFINE_HISTORY_MAX`] chat messages as context.
    ///
    /// An empty blueprint is a contract violation. Empty instructions, an
    /// unparseable reply, or a reply whose slide count differs from the
    /// input all return the input unchanged. `slide_id`s are preserved by
    /// index when the reply omits them, so untouched slides keep their
    /// identity across the edit.
    pub async fn refine(
        &self,
        blueprint: &Blueprint,
        history: &[String],
        instructions: &str,
    ) -> Result<Blueprint> {
        if blueprint.slides.is_empty() {
            return Err(PipelineError::Contract(
                "blueprint must contain at least one slide".into(),
            ));
        }
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Ok(blueprint.clone());
        }

        let (system, user) = prompts::refine(blueprint, history, instructions);
        let call = GatewayCall::new(user).with_system(system).expect_json();

        let value = match self.gateway.call(call).await {
            Some(GatewayContent::Json(value)) => value,
            _ => {
                warn!("refinement reply unusable; keeping outline unchanged");
                return Ok(blueprint.clone());
            }
        };

        match apply_refinement(blueprint, &value) {
            Some(refined) => Ok(refined),
            None => {
                warn!("refinement reply rejected; keeping outline unchanged");
                Ok(blueprint.clone())
            }
        }
    }
}

/// Merge a refinement reply into the input blueprint, or `None` when the
/// reply cannot be trusted in full.
fn apply_refinement(blueprint: &Blueprint, value: &Value) -> Option<Blueprint> {
    let raw = value
        .get("slides")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())?;

    if raw.len() != blueprint.slides.len() {
        warn!(
            returned = raw.len(),
            expected = blueprint.slides.len(),
            "refinement changed the slide count"
        );
        return None;
    }

    let slides = raw
        .iter()
        .zip(&blueprint.slides)
        .enumerate()
        .map(|(i, (candidate, original))| {
            let mut slide = sanitize_slide(candidate, i as u32 + 1);
            slide.slide_id = str_field(candidate, "slide_id")
                .unwrap_or_else(|| original.slide_id.clone());
            slide
        })
        .collect();

    let theme = value
        .get("theme")
        .and_then(sanitize_theme)
        .or_else(|| blueprint.theme.clone());

    Some(Blueprint {
        topic: blueprint.topic.clone(),
        chosen_angle: blueprint.chosen_angle.clone(),
        slide_count: blueprint.slide_count,
        theme,
        slides,
    })
}

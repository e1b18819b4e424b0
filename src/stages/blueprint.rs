//! Blueprint Builder stage: the slide-by-slide outline.
//!
//! Three entry points: [`BlueprintBuilder::generate`] for the one-shot
//! outline, [`BlueprintBuilder::generate_streaming`] for slide-by-slide
//! delivery over a [`StreamEvent`] sink, and
//! [`BlueprintBuilder::expand_content`] for concurrent per-slide content
//! enrichment.

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use tracing::warn;

use crate::demux::StreamDemux;
use crate::error::Result;
use crate::events::StreamEvent;
use crate::gateway::{Gateway, GatewayCall, GatewayContent};
use crate::prompts::{self, PromptVariant};
use crate::schema::blueprint::sanitize_blocks;
use crate::schema::{
    clamp_slide_count, sanitize_partial_slide, sanitize_slide, sanitize_theme, slide_id_for,
    validate_blueprint, Angle, Blueprint, BlueprintSlide,
};
use crate::PipelineError;

/// Titles used for the middle slides of a synthetic outline, in order.
const MIDDLE_TITLES: &[&str] = &[
    "Background",
    "Key Concepts",
    "Current Landscape",
    "Why It Matters",
    "Challenges",
    "Opportunities",
    "Case Study",
    "Deeper Look",
    "Implications",
    "Best Practices",
    "Risks and Trade-offs",
    "Roadmap",
    "What Comes Next",
];

/// Deterministic outline used when no model output survives validation.
///
/// First slide is always "Introduction", the last "Conclusion"; middles
/// cycle through a fixed title list. The requested count is clamped to the
/// allowed range.
pub fn synthetic_blueprint(topic: &str, angle: &Angle, slide_count: u32) -> Blueprint {
    let count = clamp_slide_count(slide_count);
    let mut slides = Vec::with_capacity(count as usize);

    for index in 1..=count {
        let (title, points, notes) = if index == 1 {
            (
                "Introduction".to_string(),
                vec![
                    format!("What {} is and why it is on the agenda", topic),
                    format!("The lens for this deck: {}", angle.title),
                    "What to take away".to_string(),
                ],
                Some(format!("Set up the topic and frame it through {}.", angle.title)),
            )
        } else if index == count {
            (
                "Conclusion".to_string(),
                vec![
                    "Recap of the main points".to_string(),
                    "Recommended next steps".to_string(),
                ],
                Some("Close with the single message the audience should keep.".to_string()),
            )
        } else {
            let title = MIDDLE_TITLES[(index as usize - 2) % MIDDLE_TITLES.len()];
            (
                title.to_string(),
                vec![
                    format!("{} in the context of {}", title, topic),
                    "Key points to develop here".to_string(),
                ],
                None,
            )
        };

        slides.push(BlueprintSlide {
            slide_id: slide_id_for(index),
            slide_index: index,
            slide_title: title,
            content_points: points,
            speaker_notes: notes,
            visual_suggestion: None,
            blocks: Vec::new(),
        });
    }

    Blueprint {
        topic: topic.to_string(),
        chosen_angle: angle.clone(),
        slide_count: count,
        theme: None,
        slides,
    }
}

/// Builds the presentation outline from a topic and chosen angle.
pub struct BlueprintBuilder {
    gateway: Arc<Gateway>,
    variant: PromptVariant,
}

impl BlueprintBuilder {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            variant: PromptVariant::Default,
        }
    }

    /// Set the prompt style variant.
    pub fn with_variant(mut self, variant: PromptVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Generate an outline with exactly `slide_count` slides (clamped to
    /// the allowed range).
    ///
    /// An empty topic is a contract violation. A reply with the wrong slide
    /// count, or no usable reply at all, falls back to
    /// [`synthetic_blueprint`].
    pub async fn generate(&self, topic: &str, angle: &Angle, slide_count: u32) -> Result<Blueprint> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::Contract("topic must not be empty".into()));
        }
        let count = clamp_slide_count(slide_count);

        let (system, user) = prompts::blueprint(topic, angle, count, self.variant);
        let call = GatewayCall::new(user)
            .with_system(system)
            .expect_json()
            .with_cache_key(format!("blueprint:{}:{}", angle.angle_id, count));

        if let Some(GatewayContent::Json(value)) = self.gateway.call(call).await {
            match checked_blueprint(&value, topic, angle, count) {
                Some(blueprint) => return Ok(blueprint),
                None => {
                    warn!(topic, count, "blueprint reply failed validation; using synthetic outline");
                }
            }
        }

        Ok(synthetic_blueprint(topic, angle, count))
    }

    /// Streaming variant: emits `Metadata`, then one `Slide` per slide in
    /// index order, then `Complete`.
    ///
    /// Consumers always receive the full sequence: if the stream dies or
    /// produces fewer usable slides than requested, the remainder is filled
    /// from the synthetic outline. The returned blueprint matches the
    /// emitted slides exactly.
    pub async fn generate_streaming(
        &self,
        topic: &str,
        angle: &Angle,
        slide_count: u32,
        sink: &mut (dyn FnMut(StreamEvent) + Send),
    ) -> Result<Blueprint> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::Contract("topic must not be empty".into()));
        }
        let count = clamp_slide_count(slide_count);

        sink(StreamEvent::Metadata {
            topic: topic.to_string(),
            chosen_angle: angle.clone(),
            slide_count: count,
            theme: None,
        });

        let (system, user) = prompts::blueprint_streaming(topic, angle, count, self.variant);
        let call = GatewayCall::new(user).with_system(system);

        let mut slides: Vec<BlueprintSlide> = Vec::new();
        let mut demux = StreamDemux::new();
        {
            let mut on_token = |token: String| {
                for value in demux.feed(&token) {
                    collect_slide(&mut slides, &value, count, sink);
                }
            };
            if self.gateway.call_streaming(call, &mut on_token).await.is_none() {
                warn!(topic, "blueprint stream did not complete");
            }
        }
        if let Some(value) = demux.finish() {
            collect_slide(&mut slides, &value, count, sink);
        }

        if (slides.len() as u32) < count {
            warn!(
                topic,
                received = slides.len(),
                expected = count,
                "filling missing slides from synthetic outline"
            );
            let fallback = synthetic_blueprint(topic, angle, count);
            for slide in fallback.slides.into_iter().skip(slides.len()) {
                sink(StreamEvent::Slide {
                    slide: slide.clone(),
                });
                slides.push(slide);
            }
        }

        sink(StreamEvent::Complete);

        Ok(Blueprint {
            topic: topic.to_string(),
            chosen_angle: angle.clone(),
            slide_count: count,
            theme: None,
            slides,
        })
    }

    /// Expand each slide's outline into rich content blocks, one concurrent
    /// model call per slide.
    ///
    /// Settle-all: a failed call leaves that slide's existing blocks in
    /// place and never affects its siblings.
    pub async fn expand_content(&self, blueprint: Blueprint) -> Blueprint {
        let Blueprint {
            topic,
            chosen_angle,
            slide_count,
            theme,
            slides,
        } = blueprint;

        let expansions = slides.into_iter().map(|slide| {
            let gateway = Arc::clone(&self.gateway);
            let topic = topic.clone();
            async move {
                let (system, user) =
                    prompts::slide_content(&topic, &slide.slide_title, &slide.content_points);
                let call = GatewayCall::new(user)
                    .with_system(system)
                    .expect_json()
                    .with_cache_key(format!("content:{}:{}", topic, slide.slide_id));

                let mut slide = slide;
                match gateway.call(call).await.and_then(GatewayContent::into_json) {
                    Some(value) => {
                        let blocks = sanitize_blocks(&value);
                        if blocks.is_empty() {
                            warn!(slide_id = %slide.slide_id, "expansion returned no usable blocks");
                        } else {
                            slide.blocks = blocks;
                        }
                    }
                    None => {
                        warn!(slide_id = %slide.slide_id, "expansion failed; keeping outline blocks");
                    }
                }
                slide
            }
        });

        let slides = join_all(expansions).await;
        Blueprint {
            topic,
            chosen_angle,
            slide_count,
            theme,
            slides,
        }
    }
}

/// Accept a validated full-outline reply, or `None` if anything disqualifies
/// it (structure, slide count).
fn checked_blueprint(value: &Value, topic: &str, angle: &Angle, count: u32) -> Option<Blueprint> {
    if let Err(e) = validate_blueprint(value) {
        warn!(error = %e, "blueprint reply structurally invalid");
        return None;
    }
    let raw = value.get("slides")?.as_array()?;
    if raw.len() as u32 != count {
        return None;
    }

    let slides = raw
        .iter()
        .enumerate()
        .map(|(i, s)| sanitize_slide(s, i as u32 + 1))
        .collect();
    let theme = value.get("theme").and_then(sanitize_theme);

    Some(Blueprint {
        topic: topic.to_string(),
        chosen_angle: angle.clone(),
        slide_count: count,
        theme,
        slides,
    })
}

/// Sanitize one demuxed object into the next slide slot and emit it.
/// Objects beyond the requested count and unusable objects are dropped.
fn collect_slide(
    slides: &mut Vec<BlueprintSlide>,
    value: &Value,
    count: u32,
    sink: &mut (dyn FnMut(StreamEvent) + Send),
) {
    if slides.len() as u32 >= count {
        return;
    }
    let position = slides.len() as u32 + 1;
    if let Some(mut slide) = sanitize_partial_slide(value, position) {
        // Arrival order wins over whatever index the model declared.
        slide.slide_index = position;
        slide.slide_id = slide_id_for(position);
        sink(StreamEvent::Slide {
            slide: slide.clone(),
        });
        slides.push(slide);
    }
}

//! Strategist stage: candidate narrative angles for a topic.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::gateway::{Gateway, GatewayCall, GatewayContent};
use crate::prompts::{self, PromptVariant};
use crate::schema::{
    dedupe_angle_ids, sanitize_angle, validate_strategy, Angle, Audience, Strategy, MAX_ANGLES,
};
use crate::PipelineError;

/// Generates 2-3 distinct narrative angles for a presentation topic.
pub struct Strategist {
    gateway: Arc<Gateway>,
    variant: PromptVariant,
}

impl Strategist {
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

    /// Generate candidate angles for `topic`.
    ///
    /// An empty topic is a contract violation. Everything else succeeds:
    /// model or validation failure falls back to [`fallback_angles`].
    pub async fn generate_angles(&self, topic: &str) -> Result<Strategy> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::Contract("topic must not be empty".into()));
        }

        let (system, user) = prompts::strategist(topic, self.variant);
        let call = GatewayCall::new(user)
            .with_system(system)
            .expect_json()
            .with_cache_key(format!("strategist:{}", topic));

        if let Some(GatewayContent::Json(value)) = self.gateway.call(call).await {
            match validate_strategy(&value) {
                Ok(()) => return Ok(strategy_from(&value)),
                Err(e) => {
                    warn!(topic, error = %e, "strategy reply failed validation; using fallback angles");
                }
            }
        }

        Ok(fallback_angles(topic))
    }
}

/// Build a Strategy from a validated reply, accepting a bare array or an
/// object wrapping one under `angles`.
fn strategy_from(value: &Value) -> Strategy {
    let raw = value
        .as_array()
        .or_else(|| value.get("angles").and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    let mut angles: Vec<Angle> = raw.iter().take(MAX_ANGLES).map(sanitize_angle).collect();
    dedupe_angle_ids(&mut angles);
    Strategy { angles }
}

fn angle(id: &str, title: &str, description: String, audience: Audience) -> Angle {
    Angle {
        angle_id: id.to_string(),
        title: title.to_string(),
        description,
        audience,
        emphasis_keywords: Vec::new(),
    }
}

const TECHNICAL_HINTS: &[&str] = &[
    "software", "ai", "data", "cloud", "engineering", "code", "technology", "system", "digital",
    "cyber", "quantum", "robot", "platform", "infrastructure",
];

const SCIENTIFIC_HINTS: &[&str] = &[
    "biology", "climate", "physics", "chemistry", "medicine", "research", "science", "health",
    "space", "energy", "genome", "ecology",
];

/// Rule-based angle triad used when no model output survives validation.
///
/// The topic is keyword-matched against domain buckets; each bucket carries
/// its own pair of angles, and topics matching neither get a generic triad.
pub fn fallback_angles(topic: &str) -> Strategy {
    let lower = topic.to_ascii_lowercase();
    let matches = |hints: &[&str]| hints.iter().any(|h| lower.contains(h));

    let angles = if matches(TECHNICAL_HINTS) {
        vec![
            angle(
                "technical-deep-dive",
                "The Technical Deep Dive",
                format!("How {} works under the hood, for an audience that wants detail.", topic),
                Audience::Technical,
            ),
            angle(
                "business-case",
                "The Business Case",
                format!("What {} changes about cost, risk, and opportunity.", topic),
                Audience::Executives,
            ),
        ]
    } else if matches(SCIENTIFIC_HINTS) {
        vec![
            angle(
                "scientific-evidence",
                "The Scientific Evidence",
                format!("What the research actually shows about {}.", topic),
                Audience::Technical,
            ),
            angle(
                "human-story",
                "The Human Story",
                format!("How {} affects real people, told through concrete examples.", topic),
                Audience::General,
            ),
        ]
    } else {
        vec![
            angle(
                "inspirational-vision",
                "The Inspirational Vision",
                format!("Why {} matters and where it could take us.", topic),
                Audience::General,
            ),
            angle(
                "practical-playbook",
                "The Practical Playbook",
                format!("Concrete steps to act on {} starting today.", topic),
                Audience::General,
            ),
            angle(
                "analytical-view",
                "The Analytical View",
                format!("The numbers, trade-offs, and open questions behind {}.", topic),
                Audience::Executives,
            ),
        ]
    };

    Strategy { angles }
}

//! Recipe Composer stage: one renderable layout recipe per blueprint slide.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::gateway::{Gateway, GatewayCall, GatewayContent};
use crate::prompts;
use crate::schema::{default_recipe, sanitize_recipe, str_field, Blueprint, Recipe};
use crate::PipelineError;

/// Turns a blueprint into per-slide layout recipes on the 12-column grid.
pub struct RecipeComposer {
    gateway: Arc<Gateway>,
}

impl RecipeComposer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Compose one recipe per slide, in slide order.
    ///
    /// An empty blueprint is a contract violation. The model reply is
    /// accepted only when it covers the blueprint's slide ids exactly once
    /// each; any count or id-set mismatch swaps in the deterministic
    /// title-plus-bullets recipe for every slide.
    pub async fn compose(&self, blueprint: &Blueprint) -> Result<Vec<Recipe>> {
        if blueprint.slides.is_empty() {
            return Err(PipelineError::Contract(
                "blueprint must contain at least one slide".into(),
            ));
        }

        let (system, user) = prompts::recipes(blueprint);
        let call = GatewayCall::new(user)
            .with_system(system)
            .expect_json()
            .with_cache_key(format!("recipes:{}", blueprint.topic));

        if let Some(GatewayContent::Json(value)) = self.gateway.call(call).await {
            match checked_recipes(blueprint, &value) {
                Some(recipes) => return Ok(recipes),
                None => {
                    warn!(
                        topic = %blueprint.topic,
                        "recipe reply failed id parity; using default recipes"
                    );
                }
            }
        }

        Ok(blueprint.slides.iter().map(default_recipe).collect())
    }
}

/// Accept a recipe reply only when it matches the blueprint's slide ids
/// exactly; the result is reordered into blueprint slide order.
fn checked_recipes(blueprint: &Blueprint, value: &Value) -> Option<Vec<Recipe>> {
    let raw = value
        .as_array()
        .or_else(|| value.get("recipes").and_then(Value::as_array))?;

    if raw.len() != blueprint.slides.len() {
        return None;
    }

    let mut by_id: HashMap<String, &Value> = HashMap::with_capacity(raw.len());
    for candidate in raw {
        let id = str_field(candidate, "slide_id")?;
        // A duplicated id means the reply lost a slide somewhere.
        if by_id.insert(id, candidate).is_some() {
            return None;
        }
    }

    let mut recipes = Vec::with_capacity(blueprint.slides.len());
    for slide in &blueprint.slides {
        let candidate = by_id.get(slide.slide_id.as_str())?;
        recipes.push(sanitize_recipe(candidate, &slide.slide_id));
    }
    Some(recipes)
}

//! End-to-end pipeline orchestration.
//!
//! A run is strictly linear: Strategist, then Blueprint Builder on the first
//! angle, then Recipe Composer, then bundle assembly. Stage fallbacks are
//! invisible at this level; the only failures that surface are input
//! contract violations, wrapped with stage context. A run never returns a
//! partial bundle.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::prompts::PromptVariant;
use crate::schema::{Angle, Blueprint, Recipe, Theme};
use crate::stages::{BlueprintBuilder, RecipeComposer, Strategist};
use crate::store::PresentationStore;
use crate::PipelineError;

/// Envelope data describing a finished bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub generated_at: DateTime<Utc>,
    pub slide_count: u32,
    #[serde(default)]
    pub theme: Option<Theme>,
}

/// The complete output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub topic: String,
    /// The angle the blueprint was built on (always the strategist's first).
    pub chosen_angle: Angle,
    /// Every angle the strategist proposed, for clients that offer a switch.
    pub available_angles: Vec<Angle>,
    pub blueprint: Blueprint,
    /// One recipe per blueprint slide, in slide order.
    pub recipes: Vec<Recipe>,
    pub metadata: BundleMetadata,
}

impl Bundle {
    /// Assemble a bundle, stamping the metadata from its parts.
    pub fn assemble(
        topic: impl Into<String>,
        chosen_angle: Angle,
        available_angles: Vec<Angle>,
        blueprint: Blueprint,
        recipes: Vec<Recipe>,
    ) -> Self {
        let metadata = BundleMetadata {
            generated_at: Utc::now(),
            slide_count: blueprint.slide_count,
            theme: blueprint.theme.clone(),
        };
        Self {
            topic: topic.into(),
            chosen_angle,
            available_angles,
            blueprint,
            recipes,
            metadata,
        }
    }
}

/// Runs the full pipeline and optionally hands results to a store.
pub struct Orchestrator {
    gateway: Arc<Gateway>,
    variant: PromptVariant,
    store: Option<Arc<dyn PresentationStore>>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self {
            gateway,
            variant: PromptVariant::Default,
            store: None,
        }
    }

    /// Set the prompt style variant used by every stage.
    pub fn with_variant(mut self, variant: PromptVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Attach a store. Writes are best-effort: failures are logged and the
    /// run continues.
    pub fn with_store(mut self, store: Arc<dyn PresentationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run the full pipeline for `topic` with `slide_count` slides
    /// (clamped to the allowed range by the Blueprint stage).
    pub async fn run(&self, topic: &str, slide_count: u32) -> Result<Bundle> {
        info!(topic, slide_count, "starting pipeline run");

        let strategy = Strategist::new(Arc::clone(&self.gateway))
            .with_variant(self.variant)
            .generate_angles(topic)
            .await
            .map_err(|e| stage_failed("strategist", topic, e))?;

        let chosen = match strategy.angles.first() {
            Some(angle) => angle.clone(),
            // The strategist contract guarantees at least two angles; treat
            // a violation as a stage failure rather than panicking.
            None => {
                return Err(stage_failed(
                    "strategist",
                    topic,
                    PipelineError::Contract("strategy carried no angles".into()),
                ))
            }
        };

        let blueprint = BlueprintBuilder::new(Arc::clone(&self.gateway))
            .with_variant(self.variant)
            .generate(topic, &chosen, slide_count)
            .await
            .map_err(|e| stage_failed("blueprint", topic, e))?;

        // Draft write before the recipe pass; the id carries to the update.
        let draft = Bundle::assemble(
            blueprint.topic.clone(),
            chosen.clone(),
            strategy.angles.clone(),
            blueprint.clone(),
            Vec::new(),
        );
        let stored_id = self.try_insert(&draft).await;

        let recipes = RecipeComposer::new(Arc::clone(&self.gateway))
            .compose(&blueprint)
            .await
            .map_err(|e| stage_failed("recipes", topic, e))?;

        let bundle = Bundle::assemble(
            blueprint.topic.clone(),
            chosen,
            strategy.angles,
            blueprint,
            recipes,
        );

        if let Some(id) = stored_id {
            self.try_update(&id, &bundle).await;
        }

        info!(
            topic = %bundle.topic,
            slides = bundle.blueprint.slides.len(),
            "pipeline run complete"
        );
        Ok(bundle)
    }

    async fn try_insert(&self, bundle: &Bundle) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.insert(bundle).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "draft bundle write failed; continuing without persistence");
                None
            }
        }
    }

    async fn try_update(&self, id: &str, bundle: &Bundle) {
        if let Some(store) = &self.store {
            if let Err(e) = store.update(id, bundle).await {
                warn!(id, error = %e, "final bundle write failed");
            }
        }
    }
}

fn stage_failed(stage: &'static str, topic: &str, source: PipelineError) -> PipelineError {
    PipelineError::StageFailed {
        stage,
        topic: topic.to_string(),
        message: source.to_string(),
    }
}

/// Convenience entry point: run the whole pipeline once.
pub async fn run_pipeline(gateway: Arc<Gateway>, topic: &str, slide_count: u32) -> Result<Bundle> {
    Orchestrator::new(gateway).run(topic, slide_count).await
}

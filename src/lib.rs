//! # Slidesmith
//!
//! An AI presentation-generation pipeline: topic in, renderable slide deck
//! out, with every model reply treated as untrusted input.
//!
//! The pipeline runs three stages in order. The **Strategist** proposes
//! presentation angles for a topic, the **Blueprint Builder** expands the
//! chosen angle into a slide-by-slide outline, and the **Recipe Composer**
//! turns each outline slide into a layout recipe on a 12-column grid. A
//! fourth stage, the **Refiner**, applies conversational edits to an
//! existing outline outside the main run.
//!
//! ## Core Concepts
//!
//! - **[`Gateway`]** — the single seam between stages and model providers.
//!   Routes calls to a caching proxy with direct-provider fallback, retries
//!   with backoff, and extracts JSON from messy replies.
//! - **[`Backend`](backend::Backend)** — object-safe trait over HTTP model
//!   providers. [`DirectBackend`](backend::DirectBackend) speaks the
//!   chat-completions wire format; [`ProxyBackend`](backend::ProxyBackend)
//!   adds cache headers; [`MockBackend`](backend::MockBackend) scripts
//!   replies for tests.
//! - **[`Orchestrator`]** — runs the stages end to end and assembles a
//!   [`Bundle`], optionally persisting drafts through a
//!   [`PresentationStore`](store::PresentationStore).
//! - **[`StreamDemux`](demux::StreamDemux)** — splits a concatenated-JSON
//!   token stream into complete objects for slide-at-a-time delivery.
//!
//! Stages never fail on bad model output: unusable replies resolve to
//! deterministic fallback artifacts, and `Err` is reserved for caller
//! contract violations.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use slidesmith::{Gateway, run_pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Arc::new(
//!         Gateway::builder("gpt-4o-mini")
//!             .provider_key(std::env::var("OPENAI_API_KEY")?)
//!             .build()?,
//!     );
//!
//!     let bundle = run_pipeline(gateway, "The history of container shipping", 8).await?;
//!     println!(
//!         "{} slides on '{}'",
//!         bundle.blueprint.slides.len(),
//!         bundle.chosen_angle.title
//!     );
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod demux;
pub mod error;
pub mod events;
pub mod gateway;
pub mod orchestrator;
pub mod parse;
pub mod prompts;
pub mod schema;
pub mod stages;
pub mod store;

pub use error::{PipelineError, Result};
pub use events::StreamEvent;
pub use gateway::{Gateway, GatewayCall, GatewayContent};
pub use orchestrator::{run_pipeline, Bundle, BundleMetadata, Orchestrator};
pub use prompts::PromptVariant;
pub use schema::{Angle, Blueprint, BlueprintSlide, Recipe, Strategy, Theme};
pub use stages::{BlueprintBuilder, RecipeComposer, Refiner, Strategist};
pub use store::{MemoryStore, PresentationStore};

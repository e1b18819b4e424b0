//! The four pipeline stages: Strategist, Blueprint Builder, Blueprint
//! Refiner, and Recipe Composer.
//!
//! Every stage follows the same contract: `Err` is reserved for input
//! contract violations (empty topic, empty blueprint). Model failures,
//! transport failures, and malformed replies never surface as errors; the
//! stage logs them and returns its deterministic fallback artifact, so a
//! pipeline run always produces a complete result.

pub mod blueprint;
pub mod recipes;
pub mod refine;
pub mod strategist;

pub use blueprint::{synthetic_blueprint, BlueprintBuilder};
pub use recipes::RecipeComposer;
pub use refine::Refiner;
pub use strategist::{fallback_angles, Strategist};

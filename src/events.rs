//! Events emitted by the streaming Blueprint variant.
//!
//! Consumers receive a strict sequence: one `metadata` event, then one
//! `slide` event per slide in index order, then `complete`. An `error`
//! event is terminal; nothing follows it.

use serde::{Deserialize, Serialize};

use crate::schema::{Angle, BlueprintSlide, Theme};

/// One event on a streaming blueprint channel.
///
/// Wire format is a tagged object, e.g.
/// `{"event": "slide", "slide": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Emitted first: the run's envelope before any slide exists. Carries
    /// the full chosen angle, matching what the one-shot path returns.
    Metadata {
        topic: String,
        chosen_angle: Angle,
        slide_count: u32,
        #[serde(default)]
        theme: Option<Theme>,
    },
    /// One finished slide, in index order.
    Slide { slide: BlueprintSlide },
    /// The outline is complete; no further events follow.
    Complete,
    /// Terminal failure; no further events follow.
    Error { message: String },
}

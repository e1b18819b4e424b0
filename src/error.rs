use std::time::Duration;
use thiserror::Error;

/// Errors produced by the pipeline and its components.
///
/// Only two variants ever cross a stage boundary: [`PipelineError::Contract`]
/// (the caller violated an input contract — a programming error, never
/// retried or faked) and [`PipelineError::StageFailed`] (the orchestrator's
/// wrapper around a contract violation, adding stage and topic context).
/// Everything else is recovered internally: transport and parse failures
/// resolve to gateway `None` results, which stages turn into deterministic
/// fallback artifacts.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON parsing failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The `retry_after` field
    /// is populated from the `Retry-After` response header when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The caller violated a stage's input contract (empty topic, empty
    /// blueprint, etc.). Thrown immediately; never retried or faked.
    #[error("contract violation: {0}")]
    Contract(String),

    /// A pipeline stage surfaced a contract violation; the orchestrator wraps
    /// it with stage context before handing it to the caller.
    #[error("stage '{stage}' failed for topic '{topic}': {message}")]
    StageFailed {
        stage: &'static str,
        topic: String,
        message: String,
    },

    /// Invalid configuration detected at build time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors (store implementations, custom backends).
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

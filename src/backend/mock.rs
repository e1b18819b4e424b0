//! Test backends: canned responses and guaranteed failures.
//!
//! [`MockBackend`] returns pre-configured responses in order, so pipeline
//! stages can be tested deterministically without a live model.
//! [`FailingBackend`] always fails with a chosen HTTP status, for exercising
//! fallback paths.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

/// A test backend that returns canned responses in order.
///
/// Cycles back to the beginning when all responses have been consumed.
/// For streaming, emits the entire response as a single token.
#[derive(Debug)]
pub struct MockBackend {
    responses: Vec<String>,
    index: AtomicUsize,
}

impl MockBackend {
    /// Create a mock with the given canned responses, returned in order.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(
            !responses.is_empty(),
            "MockBackend requires at least one response"
        );
        Self {
            responses,
            index: AtomicUsize::new(0),
        }
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Number of calls served so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    fn next_response(&self) -> String {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        self.responses[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
    ) -> Result<LlmResponse> {
        Ok(LlmResponse {
            text: self.next_response(),
            status: 200,
            metadata: None,
        })
    }

    async fn complete_streaming(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let text = self.next_response();
        on_token(text.clone());
        Ok(LlmResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A test backend that fails every call with a fixed HTTP status.
#[derive(Debug)]
pub struct FailingBackend {
    status: u16,
}

impl FailingBackend {
    /// Fail every call with the given status code.
    pub fn new(status: u16) -> Self {
        Self { status }
    }

    fn error(&self) -> PipelineError {
        PipelineError::HttpError {
            status: self.status,
            body: "simulated failure".into(),
            retry_after: None,
        }
    }
}

#[async_trait]
impl Backend for FailingBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
    ) -> Result<LlmResponse> {
        Err(self.error())
    }

    async fn complete_streaming(
        &self,
        _client: &Client,
        _base_url: &str,
        _request: &LlmRequest,
        _on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        Err(self.error())
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

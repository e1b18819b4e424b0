//! Backend trait and normalized request/response types.
//!
//! The [`Backend`] trait abstracts over model transports, translating between
//! normalized [`LlmRequest`]/[`LlmResponse`] types and provider-specific
//! HTTP calls. Built-in implementations: [`DirectBackend`] (OpenAI-compatible
//! provider), [`ProxyBackend`] (caching proxy in front of the provider), and
//! [`MockBackend`]/[`FailingBackend`] for tests.
//!
//! ```text
//! Gateway ──► LlmRequest ──► Backend::complete() ──► LlmResponse
//!                                    │
//!                        ┌───────────┴───────────┐
//!                   ProxyBackend            DirectBackend
//!                   cache headers           /v1/chat/completions
//!                   pass-through auth       SSE streaming
//! ```

pub mod backoff;
pub mod direct;
pub mod mock;
pub mod proxy;
pub mod sse;

pub use backoff::BackoffConfig;
pub use direct::DirectBackend;
pub use mock::{FailingBackend, MockBackend};
pub use proxy::ProxyBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::PipelineError;

/// Generation parameters shared by every backend.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Ask the provider for a guaranteed-JSON response body.
    pub json_mode: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            json_mode: false,
        }
    }
}

/// A normalized model request, provider-agnostic.
///
/// The [`Gateway`](crate::gateway::Gateway) builds this from a stage prompt;
/// the [`Backend`] translates it into the provider-specific HTTP request.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    pub model: String,

    /// Optional system prompt. Empty means a bare user message.
    pub system_prompt: Option<String>,

    /// The user prompt text.
    pub prompt: String,

    /// Generation parameters.
    pub config: CallConfig,

    /// Cache identity for proxy-routed calls. Ignored by [`DirectBackend`];
    /// [`ProxyBackend`] turns it into cache directive headers.
    pub cache_key: Option<String>,

    /// Whether to use the streaming endpoint.
    pub stream: bool,
}

impl LlmRequest {
    /// A request with default generation parameters.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            prompt: prompt.into(),
            config: CallConfig::default(),
            cache_key: None,
            stream: false,
        }
    }
}

/// A normalized model response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code, for diagnostics.
    pub status: u16,

    /// Provider-specific metadata (token usage, model info), raw JSON.
    pub metadata: Option<Value>,
}

/// Abstraction over model transports.
///
/// Implementors translate between the normalized [`LlmRequest`]/
/// [`LlmResponse`] and the provider's HTTP API, in non-streaming and
/// streaming (token callback) modes.
///
/// Object-safe; designed to be used as `Arc<dyn Backend>`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a non-streaming model call.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Execute a streaming model call.
    ///
    /// `on_token` is called for each token as it arrives. The final
    /// accumulated text is returned as an [`LlmResponse`].
    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging.
    fn name(&self) -> &'static str;
}

/// Build the `/v1/chat/completions` request body shared by the HTTP backends.
pub(crate) fn chat_body(request: &LlmRequest, stream: bool) -> Value {
    let mut messages = Vec::new();
    if let Some(ref sys) = request.system_prompt {
        if !sys.is_empty() {
            messages.push(json!({"role": "system", "content": sys}));
        }
    }
    messages.push(json!({"role": "user", "content": request.prompt}));

    let mut body = json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.config.temperature,
        "max_tokens": request.config.max_tokens,
        "stream": stream,
    });
    if request.config.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

/// Pull the assistant message text out of a chat completion response.
pub(crate) fn message_content(response: &Value) -> String {
    response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Keep the useful diagnostics fields from a provider response.
pub(crate) fn response_metadata(response: &Value) -> Option<Value> {
    let mut meta = serde_json::Map::new();
    for key in ["usage", "model", "id"] {
        if let Some(v) = response.get(key) {
            meta.insert(key.into(), v.clone());
        }
    }
    if meta.is_empty() {
        None
    } else {
        Some(Value::Object(meta))
    }
}

/// Parse a `Retry-After` header value as whole seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Convert a non-success response into [`PipelineError::HttpError`],
/// preserving the `Retry-After` hint.
pub(crate) async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let retry_after = resp
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = resp.text().await.unwrap_or_default();
    Err(PipelineError::HttpError {
        status,
        body,
        retry_after,
    })
}

/// Check whether an error is worth a transport retry.
///
/// Retryable: [`PipelineError::HttpError`] with a status in
/// `config.retryable_statuses`, and [`PipelineError::Request`] (connection
/// or transfer failures).
pub fn is_retryable(error: &PipelineError, config: &BackoffConfig) -> bool {
    match error {
        PipelineError::HttpError { status, .. } => config.retryable_statuses.contains(status),
        PipelineError::Request(_) => true,
        _ => false,
    }
}

fn retry_delay(config: &BackoffConfig, attempt: u32, last_error: &Option<PipelineError>) -> Duration {
    if config.respect_retry_after {
        if let Some(PipelineError::HttpError {
            retry_after: Some(ra),
            ..
        }) = last_error
        {
            return *ra;
        }
    }
    config.delay_for_attempt(attempt - 1)
}

/// Execute a backend call with transport-level retry and exponential backoff.
///
/// Returns the first successful response, or the last error once retries
/// are exhausted. Non-retryable errors return immediately.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    config: &BackoffConfig,
) -> Result<LlmResponse> {
    let mut last_error: Option<PipelineError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = retry_delay(config, attempt, &last_error);
            debug!(
                backend = backend.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after transient failure"
            );
            tokio::time::sleep(delay).await;
        }

        match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt < config.max_retries && is_retryable(&e, config) {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| PipelineError::Other("backoff loop exited unexpectedly".into())))
}

/// Streaming counterpart of [`with_backoff`].
///
/// A retry restarts the stream from scratch, so only attempts that failed
/// before delivering any tokens are retried. Once a token has reached
/// `on_token`, a failure surfaces immediately and the caller decides what
/// to do with the partial output.
pub async fn with_backoff_streaming(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    config: &BackoffConfig,
    on_token: &mut (dyn FnMut(String) + Send),
) -> Result<LlmResponse> {
    use std::sync::atomic::{AtomicBool, Ordering};

    let mut last_error: Option<PipelineError> = None;
    let delivered = AtomicBool::new(false);

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = retry_delay(config, attempt, &last_error);
            debug!(
                backend = backend.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying stream after transient failure"
            );
            tokio::time::sleep(delay).await;
        }

        delivered.store(false, Ordering::Relaxed);
        let mut wrapped = |token: String| {
            delivered.store(true, Ordering::Relaxed);
            on_token(token);
        };

        match backend
            .complete_streaming(client, base_url, request, &mut wrapped)
            .await
        {
            Ok(response) => return Ok(response),
            Err(e) => {
                if attempt < config.max_retries
                    && is_retryable(&e, config)
                    && !delivered.load(Ordering::Relaxed)
                {
                    last_error = Some(e);
                    continue;
                }
                return Err(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| PipelineError::Other("backoff loop exited unexpectedly".into())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_429() {
        let config = BackoffConfig::standard();
        let err = PipelineError::HttpError {
            status: 429,
            body: "rate limited".into(),
            retry_after: None,
        };
        assert!(is_retryable(&err, &config));
    }

    #[test]
    fn test_is_retryable_503() {
        let config = BackoffConfig::standard();
        let err = PipelineError::HttpError {
            status: 503,
            body: "service unavailable".into(),
            retry_after: None,
        };
        assert!(is_retryable(&err, &config));
    }

    #[test]
    fn test_is_retryable_400_not_retried() {
        let config = BackoffConfig::standard();
        let err = PipelineError::HttpError {
            status: 400,
            body: "bad request".into(),
            retry_after: None,
        };
        assert!(!is_retryable(&err, &config));
    }

    #[test]
    fn test_is_retryable_contract_not_retried() {
        let config = BackoffConfig::standard();
        let err = PipelineError::Contract("empty topic".into());
        assert!(!is_retryable(&err, &config));
    }

    #[test]
    fn test_chat_body_shape() {
        let mut request = LlmRequest::new("gpt-4o-mini", "Outline a deck about rust.");
        request.system_prompt = Some("You are a presentation strategist.".into());

        let body = chat_body(&request, false);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["stream"], false);

        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_chat_body_json_mode() {
        let mut request = LlmRequest::new("gpt-4o-mini", "give me json");
        request.config.json_mode = true;

        let body = chat_body(&request, false);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_chat_body_no_system() {
        let request = LlmRequest::new("gpt-4o-mini", "hi");
        let body = chat_body(&request, true);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_message_content_extraction() {
        let resp = json!({
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"total_tokens": 12}
        });
        assert_eq!(message_content(&resp), "hello");
        assert_eq!(message_content(&json!({"choices": []})), "");
    }

    #[test]
    fn test_response_metadata_keeps_usage() {
        let resp = json!({"usage": {"total_tokens": 9}, "model": "m", "choices": []});
        let meta = response_metadata(&resp).expect("metadata");
        assert_eq!(meta["usage"]["total_tokens"], 9);
        assert_eq!(meta["model"], "m");
        assert!(response_metadata(&json!({"choices": []})).is_none());
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct"), None);
    }

    #[tokio::test]
    async fn test_with_backoff_gives_up_on_persistent_failure() {
        let backend: Arc<dyn Backend> = Arc::new(FailingBackend::new(503));
        let client = Client::new();
        let request = LlmRequest::new("test", "test");
        let mut config = BackoffConfig::standard();
        config.max_retries = 2;
        config.initial_delay = Duration::from_millis(1);
        config.jitter = backoff::JitterStrategy::None;

        let result = with_backoff(&backend, &client, "http://unused", &request, &config).await;
        match result {
            Err(PipelineError::HttpError { status, .. }) => assert_eq!(status, 503),
            other => panic!("expected HttpError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_with_backoff_succeeds_without_retry() {
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::fixed("ok"));
        let client = Client::new();
        let request = LlmRequest::new("test", "test");

        let resp = with_backoff(
            &backend,
            &client,
            "http://unused",
            &request,
            &BackoffConfig::none(),
        )
        .await
        .unwrap();
        assert_eq!(resp.text, "ok");
    }

    #[tokio::test]
    async fn test_with_backoff_non_retryable_returns_immediately() {
        let backend: Arc<dyn Backend> = Arc::new(FailingBackend::new(401));
        let client = Client::new();
        let request = LlmRequest::new("test", "test");

        let result = with_backoff(
            &backend,
            &client,
            "http://unused",
            &request,
            &BackoffConfig::standard(),
        )
        .await;
        match result {
            Err(PipelineError::HttpError { status, .. }) => assert_eq!(status, 401),
            other => panic!("expected HttpError, got {:?}", other),
        }
    }
}

//! Model gateway: credential routing, fallback, and response shaping.
//!
//! The [`Gateway`] is the single entry point stages use to talk to a model.
//! It owns the routing policy:
//!
//! - Primary path is the caching proxy, used only when a proxy credential is
//!   configured and structurally valid (`pk-` prefix, at least 16 chars).
//!   A malformed proxy key is never sent anywhere; the call routes straight
//!   to the provider.
//! - Any primary failure gets exactly one fallback attempt on the direct
//!   provider path.
//! - No usable credential at all is not an error: every call returns `None`
//!   and the stages fall back to their deterministic artifacts.
//!
//! The gateway is stateless across calls; each call carries its own prompt,
//! JSON expectation, and cache identity.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, warn};

use crate::backend::{
    with_backoff, with_backoff_streaming, Backend, BackoffConfig, DirectBackend, LlmRequest,
    ProxyBackend,
};
use crate::error::Result;
use crate::parse::extract_json;
use crate::PipelineError;

/// Minimum length of a structurally valid proxy credential.
const PROXY_KEY_MIN_LEN: usize = 16;

/// Check the proxy credential format: `pk-` prefix, at least 16 chars.
/// A format check only; validity is the proxy's problem.
pub fn valid_proxy_key(key: &str) -> bool {
    key.starts_with("pk-") && key.len() >= PROXY_KEY_MIN_LEN
}

/// One prompt sent through the gateway.
#[derive(Debug, Clone)]
pub struct GatewayCall {
    /// Optional system prompt.
    pub system: Option<String>,
    /// The user prompt text.
    pub user: String,
    /// Ask for JSON mode and run defensive extraction on the reply.
    pub expect_json: bool,
    /// Cache identity for the proxy path. `None` means exact-match caching.
    pub cache_key: Option<String>,
}

impl GatewayCall {
    /// A plain text call with no system prompt.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            expect_json: false,
            cache_key: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request JSON mode; the reply goes through defensive JSON extraction.
    pub fn expect_json(mut self) -> Self {
        self.expect_json = true;
        self
    }

    /// Set the cache identity used by the proxy path.
    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }
}

/// A successful gateway reply, shaped by the call's `expect_json` flag.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayContent {
    /// Extracted JSON value (`expect_json` calls).
    Json(serde_json::Value),
    /// Raw reply text.
    Text(String),
}

impl GatewayContent {
    /// The JSON value, if this is a [`GatewayContent::Json`].
    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            GatewayContent::Json(v) => Some(v),
            GatewayContent::Text(_) => None,
        }
    }

    /// The text, if this is a [`GatewayContent::Text`].
    pub fn into_text(self) -> Option<String> {
        match self {
            GatewayContent::Text(t) => Some(t),
            GatewayContent::Json(_) => None,
        }
    }
}

struct Route {
    backend: Arc<dyn Backend>,
    base_url: String,
}

impl Route {
    fn name(&self) -> &'static str {
        self.backend.name()
    }
}

/// Stateless model gateway with proxy-primary, direct-fallback routing.
///
/// # Example
///
/// ```no_run
/// use slidesmith::gateway::{Gateway, GatewayCall};
///
/// # async fn example() {
/// let gateway = Gateway::builder("gpt-4o-mini")
///     .provider_key("sk-...")
///     .proxy("https://proxy.internal", "pk-0123456789abc")
///     .build()
///     .unwrap();
///
/// let reply = gateway
///     .call(GatewayCall::new("Say hello.").with_system("Be brief."))
///     .await;
/// # }
/// ```
pub struct Gateway {
    client: Client,
    model: String,
    backoff: BackoffConfig,
    primary: Option<Route>,
    fallback: Option<Route>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("model", &self.model)
            .field("primary", &self.primary.as_ref().map(Route::name))
            .field("fallback", &self.fallback.as_ref().map(Route::name))
            .finish()
    }
}

impl Gateway {
    /// Create a new builder for the given model identifier.
    pub fn builder(model: impl Into<String>) -> GatewayBuilder {
        GatewayBuilder {
            client: None,
            model: model.into(),
            provider_base_url: "https://api.openai.com".to_string(),
            provider_key: None,
            proxy_base_url: None,
            proxy_key: None,
            backoff: None,
            primary_override: None,
            fallback_override: None,
        }
    }

    /// Name of the route a call would try first, for diagnostics.
    pub fn primary_route(&self) -> Option<&'static str> {
        self.primary.as_ref().map(Route::name)
    }

    /// Whether any route is configured at all.
    pub fn has_route(&self) -> bool {
        self.primary.is_some()
    }

    fn request_for(&self, call: &GatewayCall, stream: bool) -> LlmRequest {
        let mut request = LlmRequest::new(self.model.clone(), call.user.clone());
        request.system_prompt = call.system.clone();
        request.config.json_mode = call.expect_json;
        request.cache_key = call.cache_key.clone();
        request.stream = stream;
        request
    }

    /// Send a call, returning `None` on any unrecoverable model failure.
    ///
    /// `None` covers: no credential configured, primary and fallback both
    /// failing, and (for `expect_json`) an unparseable reply. Callers treat
    /// `None` as "use your fallback artifact".
    pub async fn call(&self, call: GatewayCall) -> Option<GatewayContent> {
        let primary = match &self.primary {
            Some(route) => route,
            None => {
                warn!("no model credentials configured; skipping model call");
                return None;
            }
        };

        let request = self.request_for(&call, false);
        let text = match self.attempt(primary, &request).await {
            Ok(text) => text,
            Err(primary_err) => {
                warn!(
                    route = primary.name(),
                    error = %primary_err,
                    "primary route failed"
                );
                let fallback = self.fallback.as_ref()?;
                match self.attempt(fallback, &request).await {
                    Ok(text) => text,
                    Err(fallback_err) => {
                        warn!(error = %fallback_err, "fallback route failed");
                        return None;
                    }
                }
            }
        };

        if call.expect_json {
            match extract_json(&text) {
                Some(value) => Some(GatewayContent::Json(value)),
                None => {
                    warn!("model reply contained no parseable JSON");
                    None
                }
            }
        } else {
            Some(GatewayContent::Text(text))
        }
    }

    /// Streaming variant of [`call`](Self::call).
    ///
    /// Tokens are forwarded to `on_token` as they arrive; the accumulated
    /// text is returned on success. Route fallback happens only when the
    /// primary failed before delivering any token, so a sink never sees a
    /// mixed stream. A mid-stream failure returns `None` and the sink keeps
    /// whatever prefix it already received.
    pub async fn call_streaming(
        &self,
        call: GatewayCall,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Option<String> {
        let primary = match &self.primary {
            Some(route) => route,
            None => {
                warn!("no model credentials configured; skipping streaming call");
                return None;
            }
        };

        let request = self.request_for(&call, true);

        use std::sync::atomic::{AtomicBool, Ordering};
        let delivered = AtomicBool::new(false);
        let mut wrapped = |token: String| {
            delivered.store(true, Ordering::Relaxed);
            on_token(token);
        };

        match self.attempt_streaming(primary, &request, &mut wrapped).await {
            Ok(text) => Some(text),
            Err(primary_err) => {
                if delivered.load(Ordering::Relaxed) {
                    warn!(
                        route = primary.name(),
                        error = %primary_err,
                        "stream failed after partial delivery"
                    );
                    return None;
                }
                warn!(
                    route = primary.name(),
                    error = %primary_err,
                    "primary stream failed before first token"
                );
                let fallback = self.fallback.as_ref()?;
                match self
                    .attempt_streaming(fallback, &request, &mut wrapped)
                    .await
                {
                    Ok(text) => Some(text),
                    Err(fallback_err) => {
                        warn!(error = %fallback_err, "fallback stream failed");
                        None
                    }
                }
            }
        }
    }

    async fn attempt(&self, route: &Route, request: &LlmRequest) -> Result<String> {
        debug!(route = route.name(), model = %self.model, "dispatching model call");
        let response = with_backoff(
            &route.backend,
            &self.client,
            &route.base_url,
            request,
            &self.backoff,
        )
        .await?;
        if response.text.trim().is_empty() {
            return Err(PipelineError::Other("model returned empty content".into()));
        }
        Ok(response.text)
    }

    async fn attempt_streaming(
        &self,
        route: &Route,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        debug!(route = route.name(), model = %self.model, "dispatching streaming call");
        let response = with_backoff_streaming(
            &route.backend,
            &self.client,
            &route.base_url,
            request,
            &self.backoff,
            on_token,
        )
        .await?;
        Ok(response.text)
    }
}

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    client: Option<Client>,
    model: String,
    provider_base_url: String,
    provider_key: Option<String>,
    proxy_base_url: Option<String>,
    proxy_key: Option<String>,
    backoff: Option<BackoffConfig>,
    primary_override: Option<Arc<dyn Backend>>,
    fallback_override: Option<Arc<dyn Backend>>,
}

impl GatewayBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the provider base URL. Default: `https://api.openai.com`.
    pub fn provider_base_url(mut self, url: impl Into<String>) -> Self {
        self.provider_base_url = url.into();
        self
    }

    /// Set the provider API key, enabling the direct route.
    pub fn provider_key(mut self, key: impl Into<String>) -> Self {
        self.provider_key = Some(key.into());
        self
    }

    /// Configure the caching proxy route.
    pub fn proxy(mut self, base_url: impl Into<String>, key: impl Into<String>) -> Self {
        self.proxy_base_url = Some(base_url.into());
        self.proxy_key = Some(key.into());
        self
    }

    /// Set the transport retry configuration.
    /// Default: [`BackoffConfig::interactive()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Replace the primary route with a custom backend (tests, local
    /// compatible servers). Credential routing is skipped.
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.primary_override = Some(backend);
        self
    }

    /// Set a custom fallback backend. Only meaningful together with
    /// [`backend`](Self::backend).
    pub fn fallback_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.fallback_override = Some(backend);
        self
    }

    /// Build the gateway, computing the route table once.
    pub fn build(self) -> Result<Gateway> {
        if self.model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "model identifier must not be empty".into(),
            ));
        }
        if self.provider_base_url.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "provider base URL must not be empty".into(),
            ));
        }

        let (primary, fallback) = if let Some(backend) = self.primary_override {
            let primary = Route {
                backend,
                base_url: self.provider_base_url.clone(),
            };
            let fallback = self.fallback_override.map(|backend| Route {
                backend,
                base_url: self.provider_base_url.clone(),
            });
            (Some(primary), fallback)
        } else {
            let direct = self.provider_key.as_ref().map(|key| Route {
                backend: Arc::new(DirectBackend::new().with_api_key(key.clone()))
                    as Arc<dyn Backend>,
                base_url: self.provider_base_url.clone(),
            });

            let proxy = match (&self.proxy_base_url, &self.proxy_key) {
                (Some(url), Some(key)) if valid_proxy_key(key) => {
                    let mut backend = ProxyBackend::new(key.clone());
                    if let Some(ref provider_key) = self.provider_key {
                        backend = backend.with_provider_key(provider_key.clone());
                    }
                    Some(Route {
                        backend: Arc::new(backend) as Arc<dyn Backend>,
                        base_url: url.clone(),
                    })
                }
                (Some(_), Some(key)) => {
                    warn!(
                        key_len = key.len(),
                        "proxy credential fails format check; routing direct"
                    );
                    None
                }
                _ => None,
            };

            match proxy {
                Some(proxy) => (Some(proxy), direct),
                None => (direct, None),
            }
        };

        Ok(Gateway {
            client: self.client.unwrap_or_default(),
            model: self.model,
            backoff: self.backoff.unwrap_or_default(),
            primary,
            fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FailingBackend, MockBackend};

    fn mock_gateway(responses: Vec<&str>) -> Gateway {
        Gateway::builder("test-model")
            .backend(Arc::new(MockBackend::new(
                responses.into_iter().map(String::from).collect(),
            )))
            .backoff(BackoffConfig::none())
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_proxy_key_format() {
        assert!(valid_proxy_key("pk-0123456789abc"));
        assert!(!valid_proxy_key("pk-short"));
        assert!(!valid_proxy_key("sk-0123456789abcdef"));
        assert!(!valid_proxy_key(""));
    }

    #[test]
    fn test_no_credentials_builds_routeless_gateway() {
        let gateway = Gateway::builder("test-model").build().unwrap();
        assert!(!gateway.has_route());
    }

    #[test]
    fn test_empty_model_rejected() {
        let result = Gateway::builder("  ").build();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn test_valid_proxy_key_routes_through_proxy() {
        let gateway = Gateway::builder("test-model")
            .provider_key("sk-provider")
            .proxy("https://proxy.internal", "pk-0123456789abc")
            .build()
            .unwrap();
        assert_eq!(gateway.primary_route(), Some("proxy"));
        assert!(gateway.fallback.is_some());
    }

    #[test]
    fn test_invalid_proxy_key_routes_direct() {
        let gateway = Gateway::builder("test-model")
            .provider_key("sk-provider")
            .proxy("https://proxy.internal", "pk-short")
            .build()
            .unwrap();
        assert_eq!(gateway.primary_route(), Some("direct"));
        assert!(gateway.fallback.is_none());
    }

    #[tokio::test]
    async fn test_call_without_route_is_none() {
        let gateway = Gateway::builder("test-model").build().unwrap();
        let reply = gateway.call(GatewayCall::new("hello")).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_text_call() {
        let gateway = mock_gateway(vec!["plain reply"]);
        let reply = gateway.call(GatewayCall::new("hello")).await.unwrap();
        assert_eq!(reply, GatewayContent::Text("plain reply".into()));
    }

    #[tokio::test]
    async fn test_json_call_extracts_fenced_json() {
        let gateway = mock_gateway(vec!["```json\n{\"angles\": []}\n```"]);
        let reply = gateway
            .call(GatewayCall::new("hello").expect_json())
            .await
            .unwrap();
        let value = reply.into_json().unwrap();
        assert!(value["angles"].is_array());
    }

    #[tokio::test]
    async fn test_json_call_unparseable_is_none() {
        let gateway = mock_gateway(vec!["I would love to help but no JSON here."]);
        let reply = gateway.call(GatewayCall::new("hello").expect_json()).await;
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_once() {
        let gateway = Gateway::builder("test-model")
            .backend(Arc::new(FailingBackend::new(500)))
            .fallback_backend(Arc::new(MockBackend::fixed("rescued")))
            .backoff(BackoffConfig::none())
            .build()
            .unwrap();

        let reply = gateway.call(GatewayCall::new("hello")).await.unwrap();
        assert_eq!(reply, GatewayContent::Text("rescued".into()));
    }

    #[tokio::test]
    async fn test_both_routes_failing_is_none() {
        let gateway = Gateway::builder("test-model")
            .backend(Arc::new(FailingBackend::new(500)))
            .fallback_backend(Arc::new(FailingBackend::new(503)))
            .backoff(BackoffConfig::none())
            .build()
            .unwrap();

        assert!(gateway.call(GatewayCall::new("hello")).await.is_none());
    }

    #[tokio::test]
    async fn test_streaming_forwards_tokens() {
        let gateway = mock_gateway(vec!["streamed text"]);
        let mut tokens = Vec::new();
        let text = gateway
            .call_streaming(GatewayCall::new("hello"), &mut |t| tokens.push(t))
            .await
            .unwrap();
        assert_eq!(text, "streamed text");
        assert_eq!(tokens, vec!["streamed text"]);
    }

    #[tokio::test]
    async fn test_streaming_fallback_before_first_token() {
        let gateway = Gateway::builder("test-model")
            .backend(Arc::new(FailingBackend::new(502)))
            .fallback_backend(Arc::new(MockBackend::fixed("fallback stream")))
            .backoff(BackoffConfig::none())
            .build()
            .unwrap();

        let mut tokens = Vec::new();
        let text = gateway
            .call_streaming(GatewayCall::new("hello"), &mut |t| tokens.push(t))
            .await
            .unwrap();
        assert_eq!(text, "fallback stream");
        assert_eq!(tokens, vec!["fallback stream"]);
    }

    #[tokio::test]
    async fn test_empty_reply_treated_as_failure() {
        let gateway = Gateway::builder("test-model")
            .backend(Arc::new(MockBackend::fixed("   ")))
            .backoff(BackoffConfig::none())
            .build()
            .unwrap();
        assert!(gateway.call(GatewayCall::new("hello")).await.is_none());
    }
}

//! Backend routed through the caching acceleration proxy.
//!
//! The proxy speaks the same `/v1/chat/completions` wire contract as the
//! provider but accepts cache directive headers:
//!
//! - `X-Cache-Mode` — `semantic` when the request carries a cache key (the
//!   proxy may serve a semantically-equivalent cached completion), `simple`
//!   otherwise (exact-match only).
//! - `X-Cache-Key` — stable identity for the cached entry, when present.
//! - `X-Retry-Count` — upstream retries the proxy performs on our behalf,
//!   fixed at 2.
//!
//! Authentication is two-layer: the proxy credential goes in the standard
//! bearer slot, the provider key (if any) is passed through in
//! `X-Provider-Key` for the proxy's upstream call.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;

use super::sse::{delta_content, SseDecoder};
use super::{
    chat_body, error_for_status, message_content, response_metadata, Backend, LlmRequest,
    LlmResponse,
};
use crate::error::Result;
use crate::PipelineError;

/// Upstream retry count requested from the proxy.
const PROXY_RETRY_COUNT: &str = "2";

/// Backend that routes calls through the acceleration proxy.
#[derive(Clone)]
pub struct ProxyBackend {
    proxy_key: String,
    provider_key: Option<String>,
}

impl std::fmt::Debug for ProxyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBackend")
            .field("proxy_key", &redact(&self.proxy_key))
            .field("provider_key", &self.provider_key.as_deref().map(redact))
            .finish()
    }
}

fn redact(key: &str) -> String {
    if key.len() > 6 {
        format!("{}***", &key[..6])
    } else {
        "***".to_string()
    }
}

impl ProxyBackend {
    /// Create a proxy backend. The proxy credential is mandatory; the
    /// provider key is passed through when the proxy's upstream needs it.
    pub fn new(proxy_key: impl Into<String>) -> Self {
        Self {
            proxy_key: proxy_key.into(),
            provider_key: None,
        }
    }

    /// Set the provider key forwarded to the proxy's upstream call.
    pub fn with_provider_key(mut self, key: impl Into<String>) -> Self {
        self.provider_key = Some(key.into());
        self
    }

    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
        cache_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut req = client
            .post(url)
            .json(body)
            .header("Authorization", format!("Bearer {}", self.proxy_key))
            .header("X-Retry-Count", PROXY_RETRY_COUNT);

        match cache_key {
            Some(key) => {
                req = req.header("X-Cache-Mode", "semantic").header("X-Cache-Key", key);
            }
            None => {
                req = req.header("X-Cache-Mode", "simple");
            }
        }
        if let Some(ref key) = self.provider_key {
            req = req.header("X-Provider-Key", key.as_str());
        }
        req
    }

    fn completions_url(base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Backend for ProxyBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = Self::completions_url(base_url);
        let body = chat_body(request, false);

        let resp = self
            .build_http_request(client, &url, &body, request.cache_key.as_deref())
            .send()
            .await?;
        let resp = error_for_status(resp).await?;

        let status = resp.status().as_u16();
        let json_resp: Value = resp.json().await?;

        Ok(LlmResponse {
            text: message_content(&json_resp),
            status,
            metadata: response_metadata(&json_resp),
        })
    }

    async fn complete_streaming(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
        on_token: &mut (dyn FnMut(String) + Send),
    ) -> Result<LlmResponse> {
        let url = Self::completions_url(base_url);
        let body = chat_body(request, true);

        let resp = self
            .build_http_request(client, &url, &body, request.cache_key.as_deref())
            .send()
            .await?;
        let resp = error_for_status(resp).await?;
        let status = resp.status().as_u16();

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Request)?;
            for frame in decoder.feed(&chunk) {
                if let Some(content) = delta_content(&frame) {
                    if !content.is_empty() {
                        accumulated.push_str(content);
                        on_token(content.to_string());
                    }
                }
            }
        }
        for frame in decoder.finish() {
            if let Some(content) = delta_content(&frame) {
                if !content.is_empty() {
                    accumulated.push_str(content);
                    on_token(content.to_string());
                }
            }
        }

        Ok(LlmResponse {
            text: accumulated,
            status,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "proxy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn built(backend: &ProxyBackend, cache_key: Option<&str>) -> reqwest::Request {
        let client = Client::new();
        backend
            .build_http_request(
                &client,
                "https://proxy.example.com/v1/chat/completions",
                &json!({}),
                cache_key,
            )
            .build()
            .expect("build request")
    }

    #[test]
    fn test_semantic_mode_with_cache_key() {
        let backend = ProxyBackend::new("pk-0123456789abcdef");
        let req = built(&backend, Some("strategist:quantum-computing"));

        assert_eq!(req.headers()["X-Cache-Mode"], "semantic");
        assert_eq!(req.headers()["X-Cache-Key"], "strategist:quantum-computing");
        assert_eq!(req.headers()["X-Retry-Count"], "2");
    }

    #[test]
    fn test_simple_mode_without_cache_key() {
        let backend = ProxyBackend::new("pk-0123456789abcdef");
        let req = built(&backend, None);

        assert_eq!(req.headers()["X-Cache-Mode"], "simple");
        assert!(req.headers().get("X-Cache-Key").is_none());
        assert_eq!(req.headers()["X-Retry-Count"], "2");
    }

    #[test]
    fn test_proxy_bearer_and_provider_passthrough() {
        let backend =
            ProxyBackend::new("pk-0123456789abcdef").with_provider_key("sk-provider123");
        let req = built(&backend, None);

        assert_eq!(req.headers()["Authorization"], "Bearer pk-0123456789abcdef");
        assert_eq!(req.headers()["X-Provider-Key"], "sk-provider123");
    }

    #[test]
    fn test_no_provider_header_without_key() {
        let backend = ProxyBackend::new("pk-0123456789abcdef");
        let req = built(&backend, None);
        assert!(req.headers().get("X-Provider-Key").is_none());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let backend =
            ProxyBackend::new("pk-0123456789abcdef").with_provider_key("sk-provider123");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("0123456789abcdef"));
        assert!(!debug_output.contains("provider123"));
        assert!(debug_output.contains("***"));
    }
}

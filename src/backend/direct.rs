//! Direct backend for OpenAI-compatible provider APIs.
//!
//! Endpoint: `/v1/chat/completions`. Streaming uses SSE with
//! `data: {"choices": [{"delta": {"content": "token"}}]}` frames.

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

/// Backend that talks straight to an OpenAI-compatible provider.
#[derive(Clone, Default)]
pub struct DirectBackend {
    api_key: Option<String>,
}

impl std::fmt::Debug for DirectBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectBackend")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|k| {
                    if k.len() > 6 {
                        format!("{}***", &k[..6])
                    } else {
                        "***".to_string()
                    }
                }),
            )
            .finish()
    }
}

impl DirectBackend {
    /// Create a backend without authentication (local compatible servers).
    pub fn new() -> Self {
        Self { api_key: None }
    }

    /// Set the provider API key, sent as `Authorization: Bearer {key}`.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    fn build_http_request(
        &self,
        client: &Client,
        url: &str,
        body: &Value,
    ) -> reqwest::RequestBuilder {
        let mut req = client.post(url).json(body);
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }
        req
    }

    fn completions_url(base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Backend for DirectBackend {
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let url = Self::completions_url(base_url);
        let body = chat_body(request, false);

        let resp = self.build_http_request(client, &url, &body).send().await?;
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

        let resp = self.build_http_request(client, &url, &body).send().await?;
        let resp = error_for_status(resp).await?;
        let status = resp.status().as_u16();

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut accumulated = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(PipelineError::Request)?;
            emit_frames(decoder.feed(&chunk), &mut accumulated, on_token);
        }
        emit_frames(decoder.finish(), &mut accumulated, on_token);

        Ok(LlmResponse {
            text: accumulated,
            status,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

fn emit_frames(
    frames: Vec<Value>,
    accumulated: &mut String,
    on_token: &mut (dyn FnMut(String) + Send),
) {
    for frame in frames {
        if let Some(content) = delta_content(&frame) {
            if !content.is_empty() {
                accumulated.push_str(content);
                on_token(content.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completions_url_trailing_slash() {
        assert_eq!(
            DirectBackend::completions_url("https://api.example.com/"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_auth_header_set() {
        let backend = DirectBackend::new().with_api_key("sk-test123");
        let client = Client::new();
        let req = backend
            .build_http_request(&client, "https://api.example.com/v1/chat/completions", &json!({}))
            .build()
            .expect("build request");
        let auth = req.headers().get("Authorization").expect("auth header");
        assert_eq!(auth, "Bearer sk-test123");
    }

    #[test]
    fn test_no_auth_header_without_key() {
        let backend = DirectBackend::new();
        let client = Client::new();
        let req = backend
            .build_http_request(&client, "https://api.example.com/v1/chat/completions", &json!({}))
            .build()
            .expect("build request");
        assert!(req.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let backend = DirectBackend::new().with_api_key("sk-1234567890abcdef");
        let debug_output = format!("{:?}", backend);
        assert!(!debug_output.contains("1234567890abcdef"));
        assert!(debug_output.contains("sk-123"));
        assert!(debug_output.contains("***"));
    }
}

//! Completion API transport.
//!
//! The core only needs "send this payload, give me the body back". Response
//! classification happens in [`crate::response`], so non-2xx bodies are
//! returned as-is: the API reports its failures in an `error` field.

use crate::error::TransportError;
use crate::request::CompletionRequest;
use async_trait::async_trait;
use relay_common::config::LlmConfig;
use reqwest::Client;
use std::time::Duration;

/// Sends a completion request and returns the raw response body.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Transport name, for logs.
    fn name(&self) -> &str;

    async fn send(&self, request: &CompletionRequest) -> Result<Vec<u8>, TransportError>;
}

/// OpenRouter chat completions over HTTPS.
pub struct OpenRouterTransport {
    api_key: String,
    endpoint: String,
    client: Client,
}

impl OpenRouterTransport {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Build from configuration. The API key must be present.
    pub fn from_config(config: &LlmConfig) -> relay_common::Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                relay_common::Error::Config(
                    "OpenRouter API key not set. Set OPENROUTER_API_KEY env var.".into(),
                )
            })?;

        Ok(Self::new(
            api_key,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionTransport for OpenRouterTransport {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn send(&self, request: &CompletionRequest) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(
                status = status.as_u16(),
                model = %request.model,
                "Completion API returned non-success status"
            );
        } else {
            tracing::debug!(status = status.as_u16(), "Completion API responded");
        }

        let body = response.bytes().await.map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Turn;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "test/model".into(),
            messages: vec![Turn::system("be brief"), Turn::user("2+2?")],
        }
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig::default();
        let err = OpenRouterTransport::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_from_config_uses_endpoint() {
        let config = LlmConfig {
            api_key: Some("sk".into()),
            ..LlmConfig::default()
        };
        let transport = OpenRouterTransport::from_config(&config).unwrap();
        assert_eq!(
            transport.endpoint(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(transport.name(), "openrouter");
    }

    #[tokio::test]
    async fn test_send_posts_payload_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_json(serde_json::json!({
                "model": "test/model",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "2+2?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"choices":[{"message":{"content":"4"}}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let transport = OpenRouterTransport::new(
            "sk-test",
            format!("{}/api/v1/chat/completions", server.uri()),
            Duration::from_secs(5),
        );
        let body = transport.send(&request()).await.unwrap();

        assert_eq!(crate::response::extract(&body).unwrap(), "4");
    }

    #[tokio::test]
    async fn test_error_status_body_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_string(r#"{"error":{"message":"bad key"}}"#),
            )
            .mount(&server)
            .await;

        let transport = OpenRouterTransport::new("sk", server.uri(), Duration::from_secs(5));
        let body = transport.send(&request()).await.unwrap();

        assert!(matches!(
            crate::response::extract(&body),
            Err(crate::error::CompletionError::ApiError(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = OpenRouterTransport::new("sk", server.uri(), Duration::from_millis(200));
        let err = transport.send(&request()).await.unwrap_err();

        assert!(matches!(err, TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let transport =
            OpenRouterTransport::new("sk", "http://127.0.0.1:9/", Duration::from_secs(2));
        let err = transport.send(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            TransportError::Request(_) | TransportError::Timeout
        ));
    }
}

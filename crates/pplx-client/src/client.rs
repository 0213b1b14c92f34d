//! Main client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use pplx_core::{CompletionResponse, Directive, Transport, TransportError, TransportResult};

use crate::request::ChatCompletionRequest;
use crate::stream::{StreamAccumulator, parse_event};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Default overall deadline for one request, streamed or not.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const COMPLETIONS_PATH: &str = "chat/completions";

/// Perplexity API client.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct PerplexityClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl std::fmt::Debug for PerplexityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerplexityClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl PerplexityClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The completions endpoint requests are sent to.
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// The per-request deadline.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    async fn post(&self, body: &ChatCompletionRequest) -> TransportResult<reqwest::Response> {
        tracing::debug!(
            endpoint = %self.inner.endpoint,
            model = %body.model,
            stream = body.stream,
            "POST chat completion"
        );

        let response = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(extract_error(response).await);
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for PerplexityClient {
    async fn send(&self, directives: &[Directive]) -> TransportResult<CompletionResponse> {
        let mut body = ChatCompletionRequest::from_directives(directives);
        body.stream = false;

        let response = self.post(&body).await?;
        let text = response.text().await.map_err(map_reqwest_error)?;
        let parsed: CompletionResponse = serde_json::from_str(&text)?;

        tracing::debug!(
            model = %parsed.model,
            total_tokens = parsed.usage.total_tokens,
            "Chat completion received"
        );
        Ok(parsed)
    }

    async fn send_stream(
        &self,
        directives: &[Directive],
        tx: mpsc::Sender<CompletionResponse>,
    ) -> TransportResult<()> {
        let mut body = ChatCompletionRequest::from_directives(directives);
        body.stream = true;

        let response = self.post(&body).await?;
        let mut events = response.bytes_stream().eventsource();
        let mut accumulator = StreamAccumulator::default();
        let mut sent = 0usize;

        while let Some(event) = events.next().await {
            let event = event.map_err(map_event_error)?;
            let Some(parsed) = parse_event(&event.data) else {
                continue;
            };
            let cumulative = accumulator.absorb(parsed?);
            if tx.send(cumulative).await.is_err() {
                tracing::debug!("Stream receiver dropped, stopping early");
                break;
            }
            sent += 1;
        }

        tracing::debug!(events = sent, "Chat completion stream finished");
        Ok(())
    }

    fn name(&self) -> &str {
        "perplexity"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
    detail: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Extract an error from a failed response.
async fn extract_error(response: reqwest::Response) -> TransportError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody {
            error: Some(detail),
            ..
        }) => detail.message,
        Ok(ApiErrorBody {
            detail: Some(serde_json::Value::String(s)),
            ..
        }) => s,
        Ok(ApiErrorBody {
            detail: Some(other),
            ..
        }) => other.to_string(),
        _ if !body.trim().is_empty() => body.trim().to_string(),
        _ => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    tracing::warn!(status = status.as_u16(), %message, "API returned an error");
    TransportError::Api {
        status: status.as_u16(),
        message,
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_decode() {
        TransportError::Decode(err.to_string())
    } else if err.is_connect() {
        TransportError::Network(format!("connection failed: {}", err))
    } else {
        TransportError::Network(err.to_string())
    }
}

fn map_event_error(err: EventStreamError<reqwest::Error>) -> TransportError {
    match err {
        EventStreamError::Transport(e) => map_reqwest_error(e),
        other => TransportError::Decode(format!("malformed event stream: {}", other)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a [`PerplexityClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the overall request deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> TransportResult<PerplexityClient> {
        let api_key = self
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TransportError::Config("API key is required".to_string()))?;

        let mut base_url = Url::parse(&self.base_url)
            .map_err(|e| TransportError::Config(format!("invalid base URL: {}", e)))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let endpoint = base_url
            .join(COMPLETIONS_PATH)
            .map_err(|e| TransportError::Config(format!("invalid base URL: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim())).map_err(|_| {
            TransportError::Config("API key contains invalid characters".to_string())
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("pplx/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(PerplexityClient {
            inner: Arc::new(ClientInner {
                http,
                endpoint,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_api_key() {
        let err = ClientBuilder::new().build().unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));

        let err = ClientBuilder::new().api_key("   ").build().unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }

    #[test]
    fn test_builder_defaults() {
        let client = ClientBuilder::new().api_key("pplx-test").build().unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "https://api.perplexity.ai/chat/completions"
        );
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(client.name(), "perplexity");
    }

    #[test]
    fn test_builder_normalizes_base_url() {
        for base in ["http://localhost:9000/v1", "http://localhost:9000/v1/"] {
            let client = ClientBuilder::new()
                .base_url(base)
                .api_key("k")
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap();
            assert_eq!(
                client.endpoint().as_str(),
                "http://localhost:9000/v1/chat/completions"
            );
            assert_eq!(client.timeout(), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let err = ClientBuilder::new()
            .base_url("not a url")
            .api_key("k")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("invalid base URL"));
    }

    #[test]
    fn test_debug_hides_key() {
        let client = ClientBuilder::new().api_key("pplx-secret").build().unwrap();
        assert!(!format!("{:?}", client).contains("pplx-secret"));
    }
}

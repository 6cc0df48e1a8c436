//! Client for the local inference backend (Ollama-style `/api/chat`).
//!
//! [`UpstreamClient::open`] issues one streaming chat request and hands back
//! the response body as a lazy [`ChunkStream`]. Status errors are reported
//! before the stream exists, so nothing is relayed for a request the backend
//! rejected. There are no retries on this path.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::error::UpstreamError;
use crate::types::ChatMessage;

/// Maximum number of response-body bytes carried in [`UpstreamError::BadStatus`].
pub const STATUS_BODY_EXCERPT_BYTES: usize = 512;

/// Upstream response body: raw chunks as they come off the wire, ending with
/// an `Err` item if the transport fails mid-stream.
pub type ChunkStream = BoxStream<'static, Result<Bytes, UpstreamError>>;

/// Connection settings for the inference backend.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Chat endpoint, e.g. `http://localhost:11434/api/chat`.
    pub chat_url: String,
    /// Model catalog endpoint, e.g. `http://localhost:11434/api/tags`.
    pub models_url: String,
    /// Overall request timeout. It bounds the whole streamed response, not
    /// individual chunks.
    pub timeout: Duration,
}

impl UpstreamConfig {
    pub const DEFAULT_CHAT_URL: &'static str = "http://localhost:11434/api/chat";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Derive the catalog URL from the chat URL by swapping a trailing
    /// `/chat` segment for `/tags`.
    pub fn from_chat_url(chat_url: impl Into<String>, timeout: Duration) -> Self {
        let chat_url = chat_url.into();
        let base = chat_url.trim_end_matches('/');
        let base = base.strip_suffix("/chat").unwrap_or(base);
        Self {
            models_url: format!("{base}/tags"),
            chat_url,
            timeout,
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self::from_chat_url(Self::DEFAULT_CHAT_URL, Self::DEFAULT_TIMEOUT)
    }
}

/// Wire body of the upstream chat request.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub options: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    config: UpstreamConfig,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("chatrelay/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(UpstreamError::Client)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Open a streaming chat completion.
    ///
    /// `options.stream` is forced to `true`; every other option is passed
    /// through untouched.
    pub async fn open(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: Option<Map<String, Value>>,
    ) -> Result<ChunkStream, UpstreamError> {
        let mut options = options.unwrap_or_default();
        options.insert("stream".to_owned(), Value::Bool(true));

        let body = ChatRequest {
            model,
            messages,
            options,
        };

        debug!(url = %self.config.chat_url, model, messages = messages.len(), "opening upstream chat stream");

        let response = self
            .client
            .post(&self.config.chat_url)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(UpstreamError::Unavailable)?;

        let response = check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|item| item.map_err(|e| UpstreamError::Transport(e.to_string())))
            .boxed())
    }

    /// Names of the models the backend has installed.
    pub async fn list_models(&self) -> Result<Vec<String>, UpstreamError> {
        let response = self
            .client
            .get(&self.config.models_url)
            .send()
            .await
            .map_err(UpstreamError::Unavailable)?;

        let response = check_status(response).await?;

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::InvalidResponse(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let body = excerpt(&text, STATUS_BODY_EXCERPT_BYTES).to_owned();
    error!(status = status.as_u16(), body = %body, "upstream returned error status");
    Err(UpstreamError::BadStatus {
        status: status.as_u16(),
        body,
    })
}

/// Longest prefix of `s` no longer than `max` bytes that ends on a char boundary.
fn excerpt(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

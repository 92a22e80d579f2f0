//! Optional text-generation backend.
//!
//! The router only sees the [`GenerativeBackend`] trait. Any error, whether
//! the backend is unconfigured or failing, means "skip this branch".

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use medibook_core::config::GenerativeConfig;
use medibook_core::types::{ChatMessage, ChatRole};

use crate::error::GenerativeError;

/// Finite, non-restartable sequence of generated text chunks.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerativeError>> + Send>>;

/// Response fields that may carry the generated text, in lookup order.
const TEXT_FIELDS: &[&str] = &["output", "text", "response", "result", "content"];

/// Everything the backend is told about one message.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub input: String,
    /// Recent conversation, oldest first.
    pub context: Vec<ChatMessage>,
    /// Older assistant replies, newline-joined.
    pub summary: String,
    pub user_name: String,
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerativeError>;

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, GenerativeError>;
}

// =============================================================================
// HTTP backend
// =============================================================================

#[derive(Serialize)]
struct WireMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    input: &'a str,
    context: Vec<WireMessage<'a>>,
    summary: &'a str,
    user_name: &'a str,
    stream: bool,
}

/// JSON-over-HTTP generation service with bearer authentication.
pub struct HttpGenerativeBackend {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpGenerativeBackend {
    /// Build a backend from config, reading the key from `api_key_env`.
    pub fn new(config: &GenerativeConfig) -> Result<Self, GenerativeError> {
        Self::with_api_key(config, config.api_key())
    }

    pub fn with_api_key(
        config: &GenerativeConfig,
        api_key: Option<String>,
    ) -> Result<Self, GenerativeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn post(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<reqwest::Response, GenerativeError> {
        let api_key = match &self.api_key {
            Some(key) if !self.model.is_empty() => key,
            _ => return Err(GenerativeError::NotConfigured),
        };

        let body = WireRequest {
            model: &self.model,
            input: &request.input,
            context: request
                .context
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            summary: &request.summary,
            user_name: &request.user_name,
            stream,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerativeError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl GenerativeBackend for HttpGenerativeBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerativeError> {
        let response = self.post(request, false).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| GenerativeError::InvalidResponse(e.to_string()))?;
        extract_text(&value)
            .ok_or_else(|| GenerativeError::InvalidResponse("no text field in response".into()))
    }

    async fn generate_stream(
        &self,
        request: &GenerationRequest,
    ) -> Result<TextStream, GenerativeError> {
        let response = self.post(request, true).await?;
        debug!(endpoint = %self.endpoint, "Generation stream opened");
        Ok(sse_chunks(response.bytes_stream()))
    }
}

/// Pull the generated text out of a response body.
pub fn extract_text(value: &Value) -> Option<String> {
    if let Value::String(s) = value {
        return Some(s.clone());
    }
    for field in TEXT_FIELDS {
        if let Some(Value::String(s)) = value.get(*field) {
            return Some(s.clone());
        }
    }
    match value.get("responses")?.get(0)? {
        Value::String(s) => Some(s.clone()),
        first => first.get("content")?.as_str().map(str::to_string),
    }
}

// =============================================================================
// Server-sent events
// =============================================================================

struct SseState<S> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> SseState<S> {
    /// Move every complete line out of the buffer.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if self.accept_line(line.trim_end_matches(['\r', '\n'])) {
                self.finished = true;
                self.buffer.clear();
                return;
            }
        }
    }

    /// Queue the chunk carried by one line. Returns true on the end marker.
    fn accept_line(&mut self, line: &str) -> bool {
        let Some(data) = line.strip_prefix("data:") else {
            return false;
        };
        let data = data.strip_prefix(' ').unwrap_or(data);
        if data == "[DONE]" {
            return true;
        }
        if let Some(chunk) = chunk_text(data) {
            self.ready.push_back(chunk);
        }
        false
    }
}

fn chunk_text(data: &str) -> Option<String> {
    let text = match serde_json::from_str::<Value>(data) {
        Ok(value @ (Value::Object(_) | Value::String(_))) => extract_text(&value)?,
        _ => data.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// Turn a `text/event-stream` body into text chunks, one per `data:` line.
fn sse_chunks<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes),
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(chunk) = state.ready.pop_front() {
                return Some((Ok(chunk), state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(bytes.as_ref());
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    if !state.buffer.is_empty() {
                        state.buffer.push(b'\n');
                        state.drain_lines();
                    }
                }
            }
        }
    }))
}

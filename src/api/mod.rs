// Ollama chat API client

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::models::{ChatMessage, GenerationOptions};

/// Lazy, finite sequence of text segments produced by the model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Failed to reach model backend: {0}")]
    Connection(#[from] reqwest::Error),
    #[error("Model backend returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Malformed streaming response: {0}")]
    Malformed(String),
    #[error("Model backend error: {0}")]
    Upstream(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "GenerationOptions::is_empty")]
    pub options: GenerationOptions,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    pub content: String,
}

/// One NDJSON line of a streaming `/api/chat` response.
#[derive(Debug, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ChatChunk {
    /// The text segment carried by this line, if any.
    pub fn into_segment(self) -> Result<Option<String>, BackendError> {
        if let Some(error) = self.error {
            return Err(BackendError::Upstream(error));
        }
        match self.message {
            Some(message) if !message.content.is_empty() => Ok(Some(message.content)),
            Some(_) => Ok(None),
            None if self.done => Ok(None),
            None => Err(BackendError::Malformed(
                "missing message content".to_string(),
            )),
        }
    }
}

/// The upstream model seen as a capability: given messages and options,
/// return a stream of text segments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Open one streaming chat session.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, BackendError>;

    async fn health_check(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: Client,
}

fn parse_line(line: &[u8]) -> Option<Result<ChatChunk, BackendError>> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        serde_json::from_str::<ChatChunk>(trimmed)
            .map_err(|e| BackendError::Malformed(e.to_string())),
    )
}

/// Split an NDJSON byte stream into parsed lines, carrying partial lines
/// across reads.
fn ndjson_lines<S, B>(bytes: S) -> impl Stream<Item = Result<ChatChunk, BackendError>> + Send
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send,
{
    futures::stream::unfold(
        (Box::pin(bytes), Vec::new(), false),
        |(mut byte_stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let rest = buffer.split_off(pos + 1);
                    let line = std::mem::replace(&mut buffer, rest);
                    if let Some(result) = parse_line(&line) {
                        return Some((result, (byte_stream, buffer, false)));
                    }
                    continue;
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(bytes.as_ref()),
                    Some(Err(e)) => {
                        return Some((Err(BackendError::Connection(e)), (byte_stream, buffer, true)));
                    }
                    None => {
                        // Last line may arrive without a trailing newline
                        let tail = std::mem::take(&mut buffer);
                        return parse_line(&tail).map(|result| (result, (byte_stream, buffer, true)));
                    }
                }
            }
        },
    )
}

/// Turn parsed lines into text segments, stopping after `done` or the
/// first error.
fn segments<S>(lines: S) -> TokenStream
where
    S: Stream<Item = Result<ChatChunk, BackendError>> + Send + 'static,
{
    let stream = futures::stream::unfold(
        (Box::pin(lines), false),
        |(mut lines, finished)| async move {
            if finished {
                return None;
            }
            loop {
                let chunk = match lines.next().await? {
                    Ok(chunk) => chunk,
                    Err(e) => return Some((Err(e), (lines, true))),
                };
                let done = chunk.done;
                match chunk.into_segment() {
                    Ok(Some(text)) => return Some((Ok(text), (lines, done))),
                    Ok(None) if done => return None,
                    Ok(None) => {}
                    Err(e) => return Some((Err(e), (lines, true))),
                }
            }
        },
    );
    Box::pin(stream)
}

impl OllamaClient {
    pub fn new(base_url: String, request_timeout: u64) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, BackendError> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        Ok(segments(ndjson_lines(response.bytes_stream())))
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);

        self.client
            .get(&url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}

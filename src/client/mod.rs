//! Consumer side of the relay: submits a form, reads the frame stream and
//! reports throttled progress to the owner of the [`App`](crate::app::App).

mod decoder;
mod throttle;

pub use decoder::FrameDecoder;
pub use throttle::{Throttle, DEFAULT_INTERVAL};

use futures::stream::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::app::RequestTicket;
use crate::events::{AppEvent, StreamEvent};
use crate::models::{FormSpecification, GenerationTask};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to reach relay: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Relay rejected request ({status}): {message}")]
    Rejected {
        status: reqwest::StatusCode,
        message: String,
    },
}

/// Body posted to the relay endpoint.
#[derive(Debug, Serialize)]
pub struct SubmitRequest<'a> {
    pub task: GenerationTask,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<&'a str>,
    #[serde(flatten)]
    pub form: &'a FormSpecification,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Read one request's frame stream to its end.
///
/// The accumulated text lives only here; the owner sees throttled
/// snapshots and one final, unthrottled result.
pub async fn consume<S, B, E>(
    ticket: RequestTicket,
    body: S,
    mut throttle: Throttle,
    tx: mpsc::UnboundedSender<AppEvent>,
) where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = FrameDecoder::new();
    let mut accumulated = String::new();
    let mut dirty = false;

    let terminal = 'read: loop {
        if tx.is_closed() {
            tracing::debug!(request_id = %ticket.id, "receiver gone; closing relay connection");
            return;
        }

        let events = match body.next().await {
            Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "relay connection dropped");
                break 'read Some(StreamEvent::Error(e.to_string()));
            }
            None => match decoder.finish() {
                Some(event) => vec![event],
                None => break 'read None,
            },
        };

        for event in events {
            if event.is_terminal() {
                break 'read Some(event);
            }
            if let StreamEvent::Chunk(text) = event {
                accumulated.push_str(&text);
                dirty = true;
            }
        }

        if dirty && throttle.ready(Instant::now()) {
            dirty = false;
            let progress = AppEvent::Progress {
                ticket,
                text: accumulated.clone(),
            };
            if tx.send(progress).is_err() {
                tracing::debug!(request_id = %ticket.id, "receiver gone; closing relay connection");
                return;
            }
        }
    };

    let event = match terminal {
        Some(StreamEvent::Done(full)) if !full.is_empty() => AppEvent::Finished { ticket, text: full },
        Some(StreamEvent::Error(error)) => AppEvent::Failed { ticket, error },
        // Stream closed without a full text: settle on what was received
        _ => AppEvent::Finished {
            ticket,
            text: accumulated,
        },
    };
    if decoder.skipped() > 0 {
        tracing::warn!(skipped = decoder.skipped(), "malformed frames were skipped");
    }
    let _ = tx.send(event);
}

#[derive(Debug, Clone)]
pub struct RelayClient {
    endpoint: String,
    client: Client,
    interval: std::time::Duration,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            endpoint: format!("{}/api/ollama", base_url.trim_end_matches('/')),
            client: Client::builder().build()?,
            interval: DEFAULT_INTERVAL,
        })
    }

    #[must_use]
    pub const fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Post one submission and stream its result into `tx`.
    ///
    /// Rejections before streaming starts are returned as errors; failures
    /// during streaming arrive as [`AppEvent::Failed`].
    pub async fn submit(
        &self,
        ticket: RequestTicket,
        form: &FormSpecification,
        prompt: Option<&str>,
        tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Result<(), ClientError> {
        let request = SubmitRequest {
            task: ticket.task,
            prompt,
            form,
        };
        tracing::info!(task = %ticket.task, request_id = %ticket.id, "submitting");

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(ClientError::Rejected { status, message });
        }

        consume(
            ticket,
            response.bytes_stream(),
            Throttle::new(self.interval),
            tx,
        )
        .await;
        Ok(())
    }
}

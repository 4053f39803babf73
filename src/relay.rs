//! Re-framing an upstream token stream into relay frames.
//!
//! One frame goes out per upstream segment, in order. The stream ends with
//! exactly one terminal frame: `Done` with the full text when the upstream
//! is exhausted, or `Error` when it fails or the deadline passes.

use std::convert::Infallible;
use std::time::Duration;

use futures::stream::{Stream, StreamExt};
use tokio::time::Instant;

use crate::api::TokenStream;
use crate::events::StreamEvent;

struct RelayState {
    upstream: TokenStream,
    full_text: String,
    chunks: usize,
    deadline: Instant,
    timeout: Duration,
    finished: bool,
}

impl RelayState {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }

        let next = tokio::time::timeout_at(self.deadline, self.upstream.next()).await;
        let event = match next {
            Ok(Some(Ok(segment))) => {
                self.chunks += 1;
                self.full_text.push_str(&segment);
                return Some(StreamEvent::Chunk(segment));
            }
            Ok(Some(Err(e))) => {
                tracing::error!(error = %e, chunks = self.chunks, "upstream stream failed");
                StreamEvent::Error(e.to_string())
            }
            Ok(None) => {
                tracing::info!(
                    chunks = self.chunks,
                    bytes = self.full_text.len(),
                    "generation complete"
                );
                StreamEvent::Done(std::mem::take(&mut self.full_text))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    chunks = self.chunks,
                    "generation timed out"
                );
                StreamEvent::Error(format!(
                    "generation timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        };
        self.finished = true;
        Some(event)
    }
}

impl Drop for RelayState {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(chunks = self.chunks, "relay dropped before completion");
        }
    }
}

/// Relay events for an opened upstream session, bounded by `timeout`.
pub fn relay_events(upstream: TokenStream, timeout: Duration) -> impl Stream<Item = StreamEvent> {
    let state = RelayState {
        upstream,
        full_text: String::new(),
        chunks: 0,
        deadline: Instant::now() + timeout,
        timeout,
        finished: false,
    };
    futures::stream::unfold(state, |mut state| async move {
        let event = state.next_event().await?;
        Some((event, state))
    })
}

/// Relay as encoded frames, ready to be used as a response body.
pub fn relay(
    upstream: TokenStream,
    timeout: Duration,
) -> impl Stream<Item = Result<String, Infallible>> {
    relay_events(upstream, timeout).map(|event| Ok(event.to_frame()))
}

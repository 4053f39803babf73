// Incremental decoding of relay frames

use crate::events::{StreamEvent, FRAME_SENTINEL};

const DELIMITER: &[u8] = b"\n\n";

/// Splits a byte stream into frames, keeping any incomplete trailing frame
/// (including a split UTF-8 sequence) until the next read.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known not to start a delimiter
    scanned: usize,
    skipped: usize,
}

fn find_delimiter(buffer: &[u8], from: usize) -> Option<usize> {
    buffer
        .get(from..)?
        .windows(DELIMITER.len())
        .position(|w| w == DELIMITER)
        .map(|pos| pos + from)
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of malformed frames skipped so far.
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Feed one read; returns the events completed by it.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend(bytes.iter().copied().filter(|&b| b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = find_delimiter(&self.buffer, self.scanned) {
            let rest = self.buffer.split_off(pos + DELIMITER.len());
            let mut frame = std::mem::replace(&mut self.buffer, rest);
            frame.truncate(pos);
            self.scanned = 0;
            if let Some(event) = self.decode_frame(&frame) {
                events.push(event);
            }
        }
        // A delimiter may still straddle the tail and the next read
        self.scanned = self.buffer.len().saturating_sub(DELIMITER.len() - 1);
        events
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let frame = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.decode_frame(&frame)
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Option<StreamEvent> {
        let text = match std::str::from_utf8(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "skipping frame with invalid UTF-8");
                self.skipped += 1;
                return None;
            }
        };

        // Join multi-line data fields; other SSE fields and comments are ignored
        let payload: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix(FRAME_SENTINEL))
            .map(|data| data.strip_prefix(' ').unwrap_or(data))
            .collect();
        if payload.is_empty() {
            return None;
        }

        match StreamEvent::from_payload(&payload.join("\n")) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed frame");
                self.skipped += 1;
                None
            }
        }
    }
}

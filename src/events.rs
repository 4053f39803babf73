// Relay wire events and client-side app events

use serde::{Deserialize, Serialize};

use crate::app::RequestTicket;

/// Prefix every frame carries on the wire.
pub const FRAME_SENTINEL: &str = "data:";

/// Progress of one relayed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A segment of generated text
    Chunk(String),
    /// Generation finished; carries the full text
    Done(String),
    /// Generation failed after streaming started
    Error(String),
}

/// JSON shape of a frame. Exactly one of the three layouts is produced:
/// `{chunk, done:false}`, `{done:true, fullContent}` or `{error}`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl StreamEvent {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Error(_))
    }

    /// Render as `data: <json>\n\n`.
    pub fn to_frame(&self) -> String {
        let wire = match self {
            Self::Chunk(text) => WireFrame {
                chunk: Some(text.clone()),
                done: Some(false),
                ..WireFrame::default()
            },
            Self::Done(full) => WireFrame {
                done: Some(true),
                full_content: Some(full.clone()),
                ..WireFrame::default()
            },
            Self::Error(message) => WireFrame {
                error: Some(message.clone()),
                ..WireFrame::default()
            },
        };
        // Serializing a struct of strings and bools cannot fail
        let json = serde_json::to_string(&wire).unwrap_or_default();
        format!("{FRAME_SENTINEL} {json}\n\n")
    }

    /// Decode the JSON payload of one frame (sentinel already stripped).
    ///
    /// Returns `Ok(None)` for frames that carry nothing actionable, such as
    /// an empty chunk.
    pub fn from_payload(payload: &str) -> Result<Option<Self>, serde_json::Error> {
        let wire: WireFrame = serde_json::from_str(payload)?;
        if let Some(error) = wire.error {
            return Ok(Some(Self::Error(error)));
        }
        if wire.done == Some(true) {
            return Ok(Some(Self::Done(wire.full_content.unwrap_or_default())));
        }
        Ok(wire.chunk.filter(|c| !c.is_empty()).map(Self::Chunk))
    }
}

/// Updates sent from a request's consumer task to the owner of [`crate::app::App`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Throttled snapshot of the text received so far
    Progress { ticket: RequestTicket, text: String },
    /// Request completed with its final text
    Finished { ticket: RequestTicket, text: String },
    /// Request failed
    Failed { ticket: RequestTicket, error: String },
}

impl AppEvent {
    pub const fn ticket(&self) -> &RequestTicket {
        match self {
            Self::Progress { ticket, .. }
            | Self::Finished { ticket, .. }
            | Self::Failed { ticket, .. } => ticket,
        }
    }
}

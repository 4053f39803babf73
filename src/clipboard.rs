// System clipboard access for copying generated output

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("Failed to write clipboard: {0}")]
    Write(#[from] arboard::Error),
}

/// Anything that can receive copied text.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The desktop clipboard. Opened per copy, since a headless session may
/// have none at all.
#[derive(Debug, Default)]
pub struct SystemClipboard;

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        clipboard.set_text(text.to_owned())?;
        Ok(())
    }
}

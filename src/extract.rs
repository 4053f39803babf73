//! Locating a renderable HTML document inside free-form model output.
//!
//! Patterns are tried from most to least complete; the first match wins,
//! so a `<body>` nested in a full document never shadows the document.

use once_cell::sync::Lazy;
use regex::Regex;

const DOCTYPE: &str = "<!DOCTYPE html>";

static FENCED_DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:html)?\s*(<!DOCTYPE html>.*?)</html>\s*```")
        .expect("fenced document pattern is valid")
});

static BARE_DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<!DOCTYPE html>.*?</html>").expect("document pattern is valid")
});

static HTML_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<html(?:\s[^>]*)?>.*?</html>").expect("html pattern is valid")
});

static BODY_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<body(?:\s[^>]*)?>.*?</body>").expect("body pattern is valid")
});

/// What the preview surface should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableDocument {
    /// A complete HTML document suitable for an isolated frame
    Document(String),
    /// No document found; show the text as preformatted output
    Raw(String),
}

impl RenderableDocument {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Document(s) | Self::Raw(s) => s,
        }
    }

    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document(_))
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Document(s) | Self::Raw(s) => s,
        }
    }
}

/// Best-effort extraction. Never fails: falls back to the input text.
pub fn extract(text: &str) -> RenderableDocument {
    if let Some(inner) = FENCED_DOCUMENT.captures(text).and_then(|c| c.get(1)) {
        return RenderableDocument::Document(format!("{}</html>", inner.as_str()));
    }

    if let Some(document) = BARE_DOCUMENT.find(text) {
        return RenderableDocument::Document(document.as_str().to_string());
    }

    if let Some(html) = HTML_ELEMENT.find(text) {
        return RenderableDocument::Document(format!("{DOCTYPE}{}", html.as_str()));
    }

    if let Some(body) = BODY_ELEMENT.find(text) {
        return RenderableDocument::Document(format!("{DOCTYPE}<html>{}</html>", body.as_str()));
    }

    RenderableDocument::Raw(text.to_string())
}

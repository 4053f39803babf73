//! Relay error type mapped to `{success: false, error}` responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::api::BackendError;
use crate::prompt::PromptError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request could not be turned into a prompt.
    #[error("{0}")]
    Validation(String),
    /// Model session could not be opened.
    #[error("Failed to generate animation: {0}")]
    Upstream(#[from] BackendError),
}

impl From<PromptError> for AppError {
    fn from(e: PromptError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl AppError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(PromptError::MissingPrompt).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(BackendError::Upstream("x".to_string())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AppError::from(PromptError::MissingPrompt).to_string(),
            "Missing prompt for improvement"
        );
        assert_eq!(
            AppError::from(BackendError::Upstream("model not found".to_string())).to_string(),
            "Failed to generate animation: Model backend error: model not found"
        );
    }
}

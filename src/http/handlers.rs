//! Relay endpoint and health check.
//!
//! POST /api/ollama
//!
//! Builds the prompt for the requested task, opens one streaming session
//! against the model and relays it as `data: <json>\n\n` frames. Anything
//! that fails before the session is open is answered with a JSON error
//! instead of a stream.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ChatRequest;
use crate::http::error::AppError;
use crate::models::{FormSpecification, GenerationTask};
use crate::prompt::{build_messages, PromptInput};
use crate::relay::relay;
use crate::state::AppState;
use crate::tokens::{count_prompt_tokens, remaining_tokens};

/// Request body: a task discriminator, an optional prompt for
/// improvement, and the form fields at the top level.
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub task: GenerationTask,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub form: FormSpecification,
}

pub async fn relay_generation(
    State(state): State<AppState>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let task = request.task;
    let settings = &state.settings;

    let input = PromptInput {
        form: Some(&request.form),
        prompt: request.prompt.as_deref(),
    };
    let messages = build_messages(task, &input, settings.prompt_style).inspect_err(|e| {
        tracing::info!(task = %task, error = %e, "rejecting relay request");
    })?;

    let options = settings.options_for(task);
    let prompt_tokens = count_prompt_tokens(&messages);
    if let Some(num_ctx) = options.num_ctx {
        if remaining_tokens(prompt_tokens, num_ctx as usize).is_none() {
            tracing::warn!(
                prompt_tokens,
                num_ctx,
                "prompt is larger than the configured context window"
            );
        }
    }

    tracing::info!(
        task = %task,
        model = %settings.model,
        messages = messages.len(),
        prompt_tokens,
        "opening model stream"
    );

    let upstream = state
        .backend
        .stream_chat(ChatRequest {
            model: settings.model.clone(),
            messages,
            stream: true,
            options,
        })
        .await
        .inspect_err(|e| tracing::error!(task = %task, error = %e, "failed to open model stream"))?;

    let body = Body::from_stream(relay(upstream, settings.stream_timeout));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let upstream = state.backend.health_check().await;
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.settings.model,
        "upstream": upstream,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

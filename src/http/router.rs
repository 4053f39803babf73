//! Axum router configuration with middleware.
//!
//! Routes: `POST /api/ollama` (relay) and `GET /health`.
//! Middleware: CORS, request tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/ollama", post(handlers::relay_generation))
        .route("/health", get(handlers::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;

    use crate::api::{BackendError, ChatRequest, MockChatBackend, TokenStream};
    use crate::app::App;
    use crate::client::{FrameDecoder, RelayClient};
    use crate::events::StreamEvent;
    use crate::extract::RenderableDocument;
    use crate::models::{
        FormSpecification, GenerationOptions, GenerationTask, MessageRole, PromptStyle,
    };
    use crate::state::RelaySettings;

    fn settings() -> RelaySettings {
        RelaySettings {
            model: "test-model".to_string(),
            prompt_style: PromptStyle::Flat,
            stream_timeout: Duration::from_secs(5),
            generate: GenerationOptions::animation_defaults(),
            improve: GenerationOptions::default(),
        }
    }

    fn tokens(segments: &[&str]) -> TokenStream {
        let items: Vec<Result<String, BackendError>> =
            segments.iter().map(|s| Ok((*s).to_string())).collect();
        Box::pin(futures::stream::iter(items))
    }

    async fn spawn(backend: MockChatBackend) -> String {
        let state = AppState::new(Arc::new(backend), settings());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn read_events(response: reqwest::Response) -> Vec<StreamEvent> {
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        let mut body = response.bytes_stream();
        while let Some(bytes) = body.next().await {
            events.extend(decoder.push(&bytes.unwrap()));
        }
        events.extend(decoder.finish());
        events
    }

    #[tokio::test]
    async fn test_generate_streams_frames() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_stream_chat()
            .withf(|req: &ChatRequest| {
                req.model == "test-model"
                    && req.stream
                    && req.options.num_predict == Some(2000)
                    && req.messages.len() == 1
                    && req.messages[0].content.contains("General Instruction: bounce a ball")
                    && !req.messages[0].content.contains("Elements:")
            })
            .times(1)
            .returning(|_| Ok(tokens(&["<!DOCTYPE", " html><html>ball</html>"])));
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"general_instruction": "bounce a ball", "elements": ""}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let headers = response.headers();
        assert_eq!(headers["content-type"], "text/event-stream");
        assert_eq!(headers["cache-control"], "no-cache");
        assert_eq!(headers["connection"], "keep-alive");

        let events = read_events(response).await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Chunk("<!DOCTYPE".to_string()),
                StreamEvent::Chunk(" html><html>ball</html>".to_string()),
                StreamEvent::Done("<!DOCTYPE html><html>ball</html>".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_improve_without_prompt_is_rejected() {
        let mut backend = MockChatBackend::new();
        backend.expect_stream_chat().never();
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"task": "improve_prompt"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"success": false, "error": "Missing prompt for improvement"})
        );
    }

    #[tokio::test]
    async fn test_generate_without_instruction_is_rejected() {
        let mut backend = MockChatBackend::new();
        backend.expect_stream_chat().never();
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"elements": "a ball"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_malformed_json_is_rejected() {
        let base = spawn(MockChatBackend::new()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_upstream_setup_failure_is_500() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_stream_chat()
            .returning(|_| Err(BackendError::Upstream("model \"x\" not found".to_string())));
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"general_instruction": "spin"}))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 500);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body["error"],
            "Failed to generate animation: Model backend error: model \"x\" not found"
        );
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_in_band() {
        let mut backend = MockChatBackend::new();
        backend.expect_stream_chat().returning(|_| {
            let items: Vec<Result<String, BackendError>> = vec![
                Ok("<body>".to_string()),
                Err(BackendError::Malformed("missing message content".to_string())),
            ];
            Ok(Box::pin(futures::stream::iter(items)))
        });
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"general_instruction": "spin"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let events = read_events(response).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            StreamEvent::Error("Malformed streaming response: missing message content".to_string())
        );
    }

    #[tokio::test]
    async fn test_improve_uses_its_own_options() {
        let mut backend = MockChatBackend::new();
        backend
            .expect_stream_chat()
            .withf(|req: &ChatRequest| {
                req.options.is_empty()
                    && req.messages[0].role == MessageRole::User
                    && req.messages[0].content.contains("Original Prompt: \"wobble\"")
            })
            .returning(|_| Ok(tokens(&["A jelly wobbles"])));
        let base = spawn(backend).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/api/ollama"))
            .json(&json!({"task": "improve_prompt", "prompt": "wobble"}))
            .send()
            .await
            .unwrap();
        let events = read_events(response).await;
        assert_eq!(events.last(), Some(&StreamEvent::Done("A jelly wobbles".to_string())));
    }

    #[tokio::test]
    async fn test_health_reports_upstream() {
        let mut backend = MockChatBackend::new();
        backend.expect_health_check().returning(|| false);
        let base = spawn(backend).await;

        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["upstream"], false);
        assert_eq!(body["model"], "test-model");
    }

    #[tokio::test]
    async fn test_concurrent_generate_and_improve_stay_isolated() {
        let mut backend = MockChatBackend::new();
        backend.expect_stream_chat().returning(|req: ChatRequest| {
            if req.messages[0].content.contains("Original Prompt:") {
                Ok(tokens(&["A ball ", "bounces twice"]))
            } else {
                Ok(tokens(&["```html\n<!DOCTYPE html>", "<html>b</html>\n```"]))
            }
        });
        let base = spawn(backend).await;

        let client = RelayClient::new(&base).unwrap();
        let mut app = App::new(FormSpecification::new("bounce a ball"));
        let generate = app.begin(GenerationTask::GenerateAnimation).unwrap();
        let improve = app.begin(GenerationTask::ImprovePrompt).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let form = app.form.clone();
        let prompt = form.general_instruction.clone();
        let (generated, improved) = tokio::join!(
            client.submit(generate, &form, None, tx.clone()),
            client.submit(improve, &form, Some(&prompt), tx),
        );
        generated.unwrap();
        improved.unwrap();

        while let Some(event) = rx.recv().await {
            app.apply(event);
        }

        assert!(!app.is_loading(GenerationTask::GenerateAnimation));
        assert!(!app.is_loading(GenerationTask::ImprovePrompt));
        assert_eq!(app.form.general_instruction, "A ball bounces twice");
        assert_eq!(
            app.preview,
            Some(RenderableDocument::Document(
                "<!DOCTYPE html><html>b</html>".to_string()
            ))
        );
    }
}

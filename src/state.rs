// Shared server state

use std::sync::Arc;
use std::time::Duration;

use crate::api::{ChatBackend, OllamaClient};
use crate::models::{AppConfig, GenerationOptions, GenerationTask, PromptStyle};

/// Read-only settings the relay needs per request.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub model: String,
    pub prompt_style: PromptStyle,
    pub stream_timeout: Duration,
    pub generate: GenerationOptions,
    pub improve: GenerationOptions,
}

impl RelaySettings {
    pub const fn options_for(&self, task: GenerationTask) -> GenerationOptions {
        match task {
            GenerationTask::GenerateAnimation => self.generate,
            GenerationTask::ImprovePrompt => self.improve,
        }
    }
}

impl From<&AppConfig> for RelaySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            prompt_style: config.prompt_style,
            stream_timeout: Duration::from_secs(config.stream_timeout),
            generate: config.options_for(GenerationTask::GenerateAnimation),
            improve: config.options_for(GenerationTask::ImprovePrompt),
        }
    }
}

/// Cloned into every handler. Holds no per-request mutable state.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ChatBackend>,
    pub settings: Arc<RelaySettings>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: RelaySettings) -> Self {
        Self {
            backend,
            settings: Arc::new(settings),
        }
    }

    /// Wire the Ollama client described by `config`.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let client = OllamaClient::new(config.ollama_url.clone(), config.request_timeout)?;
        tracing::debug!(url = client.base_url(), model = %config.default_model, "model backend configured");
        Ok(Self::new(Arc::new(client), RelaySettings::from(config)))
    }
}

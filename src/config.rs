// Configuration management

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::AppConfig;

/// Environment variable that overrides the configured model name.
pub const MODEL_ENV: &str = "MODEL_NAME";

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("animgen");

    fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

    Ok(config_dir)
}

pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Load the config at `path`, or the default location when `path` is
/// `None`. A missing file is created with defaults.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => get_config_path()?,
    };

    if !config_path.exists() {
        let default_config = AppConfig::default();
        save_config(&default_config, &config_path)?;
        tracing::info!(path = %config_path.display(), "wrote default config");
        return Ok(default_config);
    }

    let contents = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

    let config: AppConfig = toml::from_str(&contents).context("Failed to parse config file")?;

    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;

    fs::write(path, contents).context("Failed to write config file")?;

    Ok(())
}

/// Apply a model name taken from the environment. Blank values are ignored.
pub fn with_model_override(mut config: AppConfig, model: Option<String>) -> AppConfig {
    if let Some(model) = model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
        config.default_model = model;
    }
    config
}

/// [`with_model_override`] fed from [`MODEL_ENV`].
pub fn apply_env_overrides(config: AppConfig) -> AppConfig {
    with_model_override(config, std::env::var(MODEL_ENV).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GenerationOptions, PromptStyle};
    use tempfile::TempDir;

    fn setup_test_env() -> TempDir {
        TempDir::new().unwrap()
    }

    #[test]
    fn test_load_config_creates_default() {
        let temp_dir = setup_test_env();
        let path = temp_dir.path().join("nested/config.toml");

        let config = load_config(Some(&path));

        assert!(
            config.is_ok(),
            "Config loading failed: {:?}",
            config.as_ref().err()
        );
        let config = config.unwrap();
        assert_eq!(config.ollama_url, "http://localhost:11434");
        assert!(path.exists());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = setup_test_env();
        let path = temp_dir.path().join("config.toml");

        let config = AppConfig {
            ollama_url: "http://custom:8080".to_string(),
            prompt_style: PromptStyle::FewShot,
            ..Default::default()
        };
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.ollama_url, "http://custom:8080");
        assert_eq!(loaded.prompt_style, PromptStyle::FewShot);
        assert_eq!(loaded.generate, GenerationOptions::animation_defaults());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = setup_test_env();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "ollama_url = \"http://gpu-box:11434\"\ndefault_model = \"llama3\"\n\n[improve]\ntemperature = 0.2\n",
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_model, "llama3");
        assert_eq!(config.stream_timeout, 300);
        assert_eq!(config.bind_address, "127.0.0.1:3000");
        assert_eq!(config.improve.temperature, Some(0.2));
        assert_eq!(config.generate.num_predict, Some(2000));
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let temp_dir = setup_test_env();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "ollama_url = [").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn test_model_override() {
        let config = with_model_override(AppConfig::default(), Some("mistral".to_string()));
        assert_eq!(config.default_model, "mistral");

        let config = with_model_override(AppConfig::default(), Some("  ".to_string()));
        assert_eq!(config.default_model, "qwen3:4b");

        let config = with_model_override(AppConfig::default(), None);
        assert_eq!(config.default_model, "qwen3:4b");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let serialized = toml::to_string(&config);
        assert!(serialized.is_ok());

        let deserialized: Result<AppConfig, _> = toml::from_str(&serialized.unwrap());
        assert!(deserialized.is_ok());
    }
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which prompt template and completion behavior a request uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GenerationTask {
    #[default]
    GenerateAnimation,
    ImprovePrompt,
}

impl GenerationTask {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerateAnimation => "generate_animation",
            Self::ImprovePrompt => "improve_prompt",
        }
    }
}

impl fmt::Display for GenerationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Vanilla,
    React,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Rendering {
    #[default]
    Dom,
    Svg,
    Canvas,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MotionType {
    Spring,
    #[default]
    Easing,
    Frame,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhysicsConstraints {
    #[serde(default)]
    pub motion_type: MotionType,
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
}

/// Optional technical direction for the generated snippet.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechConstraints {
    #[serde(default)]
    pub framework: Framework,
    #[serde(default)]
    pub rendering: Rendering,
    #[serde(default)]
    pub physics: PhysicsConstraints,
}

/// Free-form answers collected from the animation form.
///
/// Only `general_instruction` is required; every other field becomes a
/// labeled prompt line when it holds something besides whitespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormSpecification {
    #[serde(default)]
    pub general_instruction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_easing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggering: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_structure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsive_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_behavior: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_effects: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debugging_logging: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallbacks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_controls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitions_states: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_constraints: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_constraints: Option<TechConstraints>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Please fill in the {} field.", .0.replace('_', " "))]
    MissingField(&'static str),
    #[error("Unknown form field: {0}")]
    UnknownField(String),
}

impl FormSpecification {
    pub fn new(general_instruction: impl Into<String>) -> Self {
        Self {
            general_instruction: general_instruction.into(),
            ..Self::default()
        }
    }

    /// Optional fields in prompt order, paired with their labels.
    pub fn labeled_fields(&self) -> [(&'static str, Option<&str>); 16] {
        [
            ("Elements", self.elements.as_deref()),
            ("Animation Details", self.animation_details.as_deref()),
            ("Timing & Easing", self.timing_easing.as_deref()),
            ("Triggering", self.triggering.as_deref()),
            ("HTML Structure/Selectors", self.html_structure.as_deref()),
            ("Responsive Behavior", self.responsive_behavior.as_deref()),
            (
                "Sequential/Simultaneous Animation",
                self.animation_sequence.as_deref(),
            ),
            ("Repeat/Loop Behavior", self.repeat_behavior.as_deref()),
            (
                "Additional Effects/Callbacks",
                self.additional_effects.as_deref(),
            ),
            ("Debugging/Logging", self.debugging_logging.as_deref()),
            ("Fallbacks", self.fallbacks.as_deref()),
            ("User Controls", self.user_controls.as_deref()),
            ("Transitions/States", self.transitions_states.as_deref()),
            ("Style/Constraints", self.style_constraints.as_deref()),
            ("Current Code", self.current_code.as_deref()),
            ("Current Problem", self.current_problem.as_deref()),
        ]
    }

    /// Set a field by its form key.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<(), FormError> {
        let value = value.into();
        let slot = match key {
            "general_instruction" => {
                self.general_instruction = value;
                return Ok(());
            }
            "elements" => &mut self.elements,
            "animation_details" => &mut self.animation_details,
            "timing_easing" => &mut self.timing_easing,
            "triggering" => &mut self.triggering,
            "html_structure" => &mut self.html_structure,
            "responsive_behavior" => &mut self.responsive_behavior,
            "animation_sequence" => &mut self.animation_sequence,
            "repeat_behavior" => &mut self.repeat_behavior,
            "additional_effects" => &mut self.additional_effects,
            "debugging_logging" => &mut self.debugging_logging,
            "fallbacks" => &mut self.fallbacks,
            "user_controls" => &mut self.user_controls,
            "transitions_states" => &mut self.transitions_states,
            "style_constraints" => &mut self.style_constraints,
            "current_code" => &mut self.current_code,
            "current_problem" => &mut self.current_problem,
            other => return Err(FormError::UnknownField(other.to_string())),
        };
        *slot = Some(value);
        Ok(())
    }

    /// Required-presence check run before anything is sent.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.general_instruction.trim().is_empty() {
            return Err(FormError::MissingField("general_instruction"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling options forwarded to the model. Unset fields are left to the
/// model's own defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Maximum number of tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    /// Context window size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

impl GenerationOptions {
    pub const fn animation_defaults() -> Self {
        Self {
            temperature: Some(0.5),
            top_p: Some(0.9),
            num_predict: Some(2000),
            num_ctx: None,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.top_p.is_none()
            && self.num_predict.is_none()
            && self.num_ctx.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptStyle {
    /// One user message holding the whole instruction.
    #[default]
    Flat,
    /// System message and worked examples ahead of the request.
    FewShot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ollama_url: String,
    pub default_model: String,
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout: u64,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub prompt_style: PromptStyle,
    #[serde(default = "GenerationOptions::animation_defaults")]
    pub generate: GenerationOptions,
    #[serde(default)]
    pub improve: GenerationOptions,
}

const fn default_timeout() -> u64 {
    600
}

const fn default_stream_timeout() -> u64 {
    300
}

fn default_bind_address() -> String {
    "127.0.0.1:3000".to_string()
}

impl AppConfig {
    pub const fn options_for(&self, task: GenerationTask) -> GenerationOptions {
        match task {
            GenerationTask::GenerateAnimation => self.generate,
            GenerationTask::ImprovePrompt => self.improve,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            default_model: "qwen3:4b".to_string(),
            request_timeout: default_timeout(),
            stream_timeout: default_stream_timeout(),
            bind_address: default_bind_address(),
            prompt_style: PromptStyle::default(),
            generate: GenerationOptions::animation_defaults(),
            improve: GenerationOptions::default(),
        }
    }
}

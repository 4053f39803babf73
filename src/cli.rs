//! Command-line surface: the relay server and a terminal client that
//! drives the same form/submit/preview flow as a browser would.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use crate::app::App;
use crate::client::{ClientError, RelayClient};
use crate::clipboard::SystemClipboard;
use crate::events::AppEvent;
use crate::models::{
    CoordinateSystem, FormSpecification, Framework, GenerationTask, MotionType,
    PhysicsConstraints, Rendering, TechConstraints,
};

#[derive(Parser, Debug)]
#[command(name = "animgen", version, about = "Generate web animations with a local LLM")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the streaming relay
    Serve {
        /// Address to listen on, overriding the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Generate an animation and write the renderable document
    Generate(GenerateArgs),
    /// Rewrite an instruction into a more detailed one
    Improve {
        /// Instruction to improve
        #[arg(short, long)]
        prompt: String,

        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
    },
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// What the animation should do
    #[arg(short = 'i', long)]
    pub general_instruction: String,

    /// Optional form field as key=value, e.g. --field elements="a red ball"
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<(String, String)>,

    #[arg(long, value_enum)]
    pub framework: Option<Framework>,

    #[arg(long, value_enum)]
    pub rendering: Option<Rendering>,

    #[arg(long, value_enum)]
    pub motion: Option<MotionType>,

    #[arg(long, value_enum)]
    pub coordinates: Option<CoordinateSystem>,

    /// Write the full model response instead of the extracted document
    #[arg(long)]
    pub raw: bool,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also copy the full model response to the clipboard
    #[arg(long)]
    pub copy: bool,

    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub server: String,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    Ok((key.trim().to_string(), value.to_string()))
}

impl GenerateArgs {
    /// Build the form this invocation describes.
    pub fn to_form(&self) -> Result<FormSpecification> {
        let mut form = FormSpecification::new(self.general_instruction.clone());
        for (key, value) in &self.fields {
            form.set(key, value.clone())?;
        }

        let any_tech = self.framework.is_some()
            || self.rendering.is_some()
            || self.motion.is_some()
            || self.coordinates.is_some();
        if any_tech {
            form.tech_constraints = Some(TechConstraints {
                framework: self.framework.unwrap_or_default(),
                rendering: self.rendering.unwrap_or_default(),
                physics: PhysicsConstraints {
                    motion_type: self.motion.unwrap_or_default(),
                    coordinate_system: self.coordinates.unwrap_or_default(),
                },
            });
        }
        Ok(form)
    }
}

fn handle_app_event(app: &mut App, event: AppEvent) {
    if let AppEvent::Progress { ticket, .. } = &event {
        let task = ticket.task;
        if app.apply(event) {
            eprint!("\r{task}: {} chars received", app.slot(task).response.len());
        }
        return;
    }
    app.apply(event);
}

/// Submit `task` for the form held by `app` and drive events into it until
/// the request settles.
pub async fn run_task(app: &mut App, client: RelayClient, task: GenerationTask) -> Result<()> {
    // Validation happens here, before anything touches the network
    let ticket = app.begin(task)?;

    let form = app.form.clone();
    let prompt = match task {
        GenerationTask::ImprovePrompt => Some(form.general_instruction.clone()),
        GenerationTask::GenerateAnimation => None,
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let handle = tokio::spawn(async move {
        client.submit(ticket, &form, prompt.as_deref(), tx).await
    });
    app.attach(&ticket, handle.abort_handle());

    while let Some(event) = rx.recv().await {
        handle_app_event(app, event);
    }
    eprintln!();

    let submitted: Result<(), ClientError> = handle.await.context("Relay client task panicked")?;
    if let Err(e) = submitted {
        app.abort(task);
        return Err(e.into());
    }

    let slot = app.slot(task);
    if let Some(error) = &slot.last_error {
        bail!("{task} failed: {error}");
    }
    if slot.is_loading {
        // Channel closed without a final event
        app.abort(task);
        bail!("{task} ended without a result");
    }
    Ok(())
}

fn write_output(out: Option<&Path>, text: &str) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = text.len(), "wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

pub async fn generate(args: GenerateArgs) -> Result<()> {
    let mut app = App::new(args.to_form()?);
    let client = RelayClient::new(&args.server)?;
    run_task(&mut app, client, GenerationTask::GenerateAnimation).await?;

    if args.copy && app.copy_to(&mut SystemClipboard) {
        eprintln!("Copied!");
    }

    let text = if args.raw {
        app.copy_text().unwrap_or_default().to_string()
    } else {
        let Some(preview) = app.preview.take() else {
            bail!("relay finished without a response");
        };
        if preview.is_document() {
            tracing::info!(bytes = preview.as_str().len(), "extracted HTML document");
        } else {
            tracing::warn!("response held no HTML document; writing it as-is");
        }
        preview.into_string()
    };
    write_output(args.out.as_deref(), &text)
}

pub async fn improve(prompt: String, server: &str) -> Result<()> {
    let mut app = App::new(FormSpecification::new(prompt));
    let client = RelayClient::new(server)?;
    run_task(&mut app, client, GenerationTask::ImprovePrompt).await?;
    write_output(None, &app.form.general_instruction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::StreamEvent;
    use crate::extract::RenderableDocument;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn frames(chunks: &[&str]) -> String {
        let mut body: String = chunks
            .iter()
            .map(|c| StreamEvent::Chunk((*c).to_string()).to_frame())
            .collect();
        body.push_str(&StreamEvent::Done(chunks.concat()).to_frame());
        body
    }

    async fn relay_answering(body: String) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ollama"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "animgen",
            "generate",
            "-i",
            "bounce a ball",
            "--field",
            "elements=a red ball",
            "--field",
            "fallbacks=static",
            "--rendering",
            "canvas",
            "--copy",
        ])
        .unwrap();

        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let form = args.to_form().unwrap();
        assert_eq!(form.general_instruction, "bounce a ball");
        assert_eq!(form.elements.as_deref(), Some("a red ball"));
        assert_eq!(form.fallbacks.as_deref(), Some("static"));
        let tech = form.tech_constraints.unwrap();
        assert_eq!(tech.rendering, Rendering::Canvas);
        assert_eq!(tech.framework, Framework::Vanilla);
        assert!(args.copy);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let cli = Cli::try_parse_from(["animgen", "generate", "-i", "x", "--field", "colour=red"])
            .unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        assert!(args.to_form().is_err());
        assert!(parse_field("no-equals").is_err());
    }

    #[tokio::test]
    async fn test_run_task_fills_preview() {
        let server = relay_answering(frames(&[
            "Here you go:\n```html\n<!DOCTYPE html>",
            "<html><body>ball</body></html>\n```",
        ]))
        .await;

        let mut app = App::new(FormSpecification::new("bounce a ball"));
        let client = RelayClient::new(&server.uri()).unwrap().with_interval(Duration::ZERO);
        tokio_test::assert_ok!(run_task(&mut app, client, GenerationTask::GenerateAnimation).await);

        assert_eq!(
            app.preview,
            Some(RenderableDocument::Document(
                "<!DOCTYPE html><html><body>ball</body></html>".to_string()
            ))
        );
        assert!(app.copy_text().unwrap().starts_with("Here you go:"));
    }

    #[tokio::test]
    async fn test_run_task_improve_sends_instruction_as_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/ollama"))
            .and(body_partial_json(serde_json::json!({
                "task": "improve_prompt",
                "prompt": "wobble"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(frames(&["A jelly cube ", "wobbles"]), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut app = App::new(FormSpecification::new("wobble"));
        let client = RelayClient::new(&server.uri()).unwrap();
        run_task(&mut app, client, GenerationTask::ImprovePrompt)
            .await
            .unwrap();
        assert_eq!(app.form.general_instruction, "A jelly cube wobbles");
    }

    #[tokio::test]
    async fn test_run_task_validates_before_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut app = App::new(FormSpecification::new(""));
        let client = RelayClient::new(&server.uri()).unwrap();
        let err = run_task(&mut app, client, GenerationTask::GenerateAnimation)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please fill in the general instruction field.");
    }

    #[tokio::test]
    async fn test_run_task_reports_error_frame() {
        let mut body = StreamEvent::Chunk("<html>".to_string()).to_frame();
        body.push_str(&StreamEvent::Error("Model backend error: out of memory".to_string()).to_frame());
        let server = relay_answering(body).await;

        let mut app = App::new(FormSpecification::new("spin"));
        let client = RelayClient::new(&server.uri()).unwrap();
        let err = run_task(&mut app, client, GenerationTask::GenerateAnimation)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of memory"));
        assert!(!app.is_loading(GenerationTask::GenerateAnimation));
    }

    #[tokio::test]
    async fn test_run_task_rejection_clears_loading() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "success": false,
                "error": "Failed to generate animation: connection refused"
            })))
            .mount(&server)
            .await;

        let mut app = App::new(FormSpecification::new("spin"));
        let client = RelayClient::new(&server.uri()).unwrap();
        let err = run_task(&mut app, client, GenerationTask::GenerateAnimation)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(!app.is_loading(GenerationTask::GenerateAnimation));
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("animation.html");
        write_output(Some(&path), "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "<html></html>");
    }
}

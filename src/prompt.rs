// Prompt assembly for animation generation and prompt improvement

use std::fmt::Write as _;

use crate::models::{
    ChatMessage, CoordinateSystem, FormSpecification, Framework, GenerationTask, MotionType,
    PromptStyle, Rendering, TechConstraints,
};

const ANIMATION_PREAMBLE: &str = "You are an expert javascript animation developer. Generate a complete, optimized JavaScript code snippet that meets the following animation requirements:\n";

const ANIMATION_CLOSING: &str = "IMPORTANT: Ensure the code is well-optimized, follows best practices, and is cross-browser compatible.\n\
The result should be a complete, standalone HTML code snippet containing the javascript code for the animation that can be run in a browser.\n\
Keep all CSS and JavaScript inline and do not load any external resources.\n";

const FEW_SHOT_SYSTEM: &str = "You are an expert javascript animation developer. \
You answer every request with a single complete HTML document that starts with <!DOCTYPE html>, \
keeps its CSS and JavaScript inline, loads no external resources, and runs in any modern browser. \
Do not add explanations before or after the document.";

/// Worked (request, answer) pairs used by [`PromptStyle::FewShot`].
const FEW_SHOT_EXAMPLES: [(&str, &str); 2] = [
    (
        "General Instruction: fade in a heading when the page loads\nElements: an h1 heading\nTiming & Easing: 1s ease-out",
        r#"<!DOCTYPE html>
<html>
<head>
<style>
  h1 { opacity: 0; transition: opacity 1s ease-out; font-family: sans-serif; }
  h1.visible { opacity: 1; }
</style>
</head>
<body>
<h1 id="title">Hello</h1>
<script>
  window.addEventListener('load', () => {
    document.getElementById('title').classList.add('visible');
  });
</script>
</body>
</html>"#,
    ),
    (
        "General Instruction: bounce a ball\nElements: a red circle\nTriggering: starts immediately and loops",
        r#"<!DOCTYPE html>
<html>
<head>
<style>
  body { margin: 0; height: 100vh; background: #fafafa; }
  #ball { position: absolute; left: 50%; width: 40px; height: 40px; border-radius: 50%; background: #e53935; }
</style>
</head>
<body>
<div id="ball"></div>
<script>
  const ball = document.getElementById('ball');
  const floor = window.innerHeight - 40;
  let y = 0, vy = 0;
  const gravity = 0.6, restitution = 0.8;
  function step() {
    vy += gravity;
    y += vy;
    if (y > floor) { y = floor; vy = -vy * restitution; if (Math.abs(vy) < 1) vy = -18; }
    ball.style.transform = `translateY(${y}px)`;
    requestAnimationFrame(step);
  }
  requestAnimationFrame(step);
</script>
</body>
</html>"#,
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("Missing general instruction for animation generation")]
    MissingInstruction,
    #[error("Missing prompt for improvement")]
    MissingPrompt,
}

/// Everything a relay request can carry toward prompt assembly.
#[derive(Debug, Clone, Default)]
pub struct PromptInput<'a> {
    pub form: Option<&'a FormSpecification>,
    pub prompt: Option<&'a str>,
}

fn framework_rules(framework: Framework) -> &'static str {
    match framework {
        Framework::React => {
            "- Use React functional components with hooks\n\
             - All DOM access must be in useEffect/useLayoutEffect\n\
             - Use useRef for element references\n\
             - No class components\n\
             - Add error boundaries"
        }
        Framework::Vanilla => "- Use vanilla JavaScript\n- No external dependencies",
    }
}

fn rendering_rules(rendering: Rendering) -> &'static str {
    match rendering {
        Rendering::Dom => "- Use CSS transforms for smooth animations",
        Rendering::Svg => {
            "- Calculate viewBox dynamically\n- Use stroke-dasharray for line animations"
        }
        Rendering::Canvas => {
            "- Request animation frame\n- Double buffering\n- Cleanup resources"
        }
    }
}

fn physics_rules(tech: &TechConstraints) -> String {
    match tech.physics.motion_type {
        MotionType::Spring => {
            let tension = match tech.physics.coordinate_system {
                CoordinateSystem::Relative => 150,
                CoordinateSystem::Absolute => 100,
            };
            format!("- Implement spring physics with tension {tension}")
        }
        MotionType::Easing => "- Use cubic-bezier(0.4, 0, 0.2, 1) timing".to_string(),
        MotionType::Frame => "- Implement requestAnimationFrame loop".to_string(),
    }
}

fn push_tech_constraints(prompt: &mut String, tech: &TechConstraints) {
    let framework = match tech.framework {
        Framework::Vanilla => "VANILLA",
        Framework::React => "REACT",
    };
    let rendering = match tech.rendering {
        Rendering::Dom => "DOM",
        Rendering::Svg => "SVG",
        Rendering::Canvas => "CANVAS",
    };
    let coordinates = match tech.physics.coordinate_system {
        CoordinateSystem::Absolute => "absolute",
        CoordinateSystem::Relative => "relative",
    };

    prompt.push_str("Technical Constraints:\n");
    let _ = writeln!(prompt, "Framework: {framework}");
    let _ = writeln!(prompt, "{}", framework_rules(tech.framework));
    let _ = writeln!(prompt, "Rendering: {rendering}");
    let _ = writeln!(prompt, "{}", rendering_rules(tech.rendering));
    prompt.push_str("Physics:\n");
    let _ = writeln!(prompt, "{}", physics_rules(tech));
    let _ = writeln!(prompt, "Coordinate System: {coordinates}");
    prompt.push('\n');
}

/// Flat instruction for the generate task. Optional fields only appear
/// when their trimmed value is non-empty.
pub fn build_animation_prompt(form: &FormSpecification) -> String {
    let mut prompt = String::from(ANIMATION_PREAMBLE);

    if let Some(tech) = &form.tech_constraints {
        push_tech_constraints(&mut prompt, tech);
    }

    let _ = writeln!(prompt, "General Instruction: {}", form.general_instruction);

    for (label, value) in form.labeled_fields() {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let _ = writeln!(prompt, "{label}: {value}");
        }
    }

    prompt.push_str(ANIMATION_CLOSING);
    prompt
}

/// Rubric asking the model to rewrite an instruction.
pub fn build_improvement_prompt(instruction: &str) -> String {
    format!(
        r#"You are an expert prompt engineer for javascript animation development and also an expert in perceptual animation design. Improve this prompt for better results:

Original Prompt: "{instruction}"

Guidelines for Improvement:
1. You MUST identify the type of animation and the distinctive characteristics of the "movement" by answering these questions, then add the details to the improved prompt:
  - Is it a movement of a physical object or of something abstract like a graph?
    - If it is a physical object, note the distinctive characteristics of the movement based on physics: "bouncing" is different from "moving", "floating" is slower than "moving", a "bouncing ball" acts differently from a "bouncing stick".
    - If it is not a physical object, what rules does the movement follow?
  - Is it a movement of a single object or of multiple objects?
2. You MUST identify the specific elements involved in the animation and their relationships, including their starting and ending positions.
3. You MUST work out the very specific visual outcome the animation and element combination needs and describe it in detail in the improved prompt.
4. You MUST identify clear visual cues that highlight the animation in line with the original intent and include them in the improved prompt.
5. You MUST clarify element relationships.
6. You should specify performance requirements.
7. You MUST keep the original intent.

Follow the guidelines to create a more effective prompt but do not copy everything written in the guidelines.
Improved prompt (just return the improved text, no formatting):"#
    )
}

fn few_shot_transcript(user_prompt: String) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2 + FEW_SHOT_EXAMPLES.len() * 2);
    messages.push(ChatMessage::system(FEW_SHOT_SYSTEM));
    for (request, answer) in FEW_SHOT_EXAMPLES {
        messages.push(ChatMessage::user(request));
        messages.push(ChatMessage::assistant(answer));
    }
    messages.push(ChatMessage::user(user_prompt));
    messages
}

/// Build the message list sent upstream for one task.
pub fn build_messages(
    task: GenerationTask,
    input: &PromptInput<'_>,
    style: PromptStyle,
) -> Result<Vec<ChatMessage>, PromptError> {
    match task {
        GenerationTask::ImprovePrompt => {
            let instruction = input
                .prompt
                .or_else(|| input.form.map(|f| f.general_instruction.as_str()))
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or(PromptError::MissingPrompt)?;
            Ok(vec![ChatMessage::user(build_improvement_prompt(
                instruction,
            ))])
        }
        GenerationTask::GenerateAnimation => {
            let form = input
                .form
                .filter(|f| f.validate().is_ok())
                .ok_or(PromptError::MissingInstruction)?;
            let prompt = build_animation_prompt(form);
            Ok(match style {
                PromptStyle::Flat => vec![ChatMessage::user(prompt)],
                PromptStyle::FewShot => few_shot_transcript(prompt),
            })
        }
    }
}

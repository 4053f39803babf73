// Token estimates for outgoing prompts

use crate::models::{ChatMessage, MessageRole};

/// Approximate token count based on word count
/// This is a simple heuristic: ~1.3 tokens per word
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.split_whitespace().count();
    ((words as f64) * 1.3).ceil() as usize
}

/// Calculate tokens for a message including role
pub fn count_message_tokens(role: MessageRole, content: &str) -> usize {
    // Role overhead: ~4 tokens for role formatting, a little more for system
    let role_tokens = match role {
        MessageRole::System => 6,
        MessageRole::User | MessageRole::Assistant => 4,
    };
    role_tokens + estimate_tokens(content)
}

/// Calculate total tokens for a message list
pub fn count_prompt_tokens(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|m| count_message_tokens(m.role, &m.content))
        .sum()
}

/// Tokens left for the answer once the prompt is in the context window.
/// `None` when the prompt alone does not fit.
pub const fn remaining_tokens(prompt_tokens: usize, context_window_size: usize) -> Option<usize> {
    context_window_size.checked_sub(prompt_tokens)
}

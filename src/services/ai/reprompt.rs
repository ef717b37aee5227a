//! Optional LLM phrasing for re-prompts, always backed by a fixed template.

use super::{LlmProvider, Message};
use crate::models::ConversationMessage;

/// How many trailing conversation messages the generator sees.
pub const HISTORY_WINDOW: usize = 3;

/// Asks the generator to phrase `instruction` in context. Any failure, an empty reply, or a
/// missing generator yields `fallback` unchanged.
pub async fn phrase(
    llm: Option<&dyn LlmProvider>,
    system_prompt: &str,
    instruction: &str,
    history: &[ConversationMessage],
    fallback: String,
) -> String {
    let Some(llm) = llm else {
        return fallback;
    };

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let mut messages: Vec<Message> = history[start..].iter().map(Message::from).collect();
    messages.push(Message {
        role: "user".to_string(),
        content: instruction.to_string(),
    });

    match llm.chat(system_prompt, &messages).await {
        Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
        Ok(_) => {
            tracing::warn!("LLM returned an empty reply, using template");
            fallback
        }
        Err(e) => {
            tracing::warn!(error = %e, "LLM re-prompt failed, using template");
            fallback
        }
    }
}

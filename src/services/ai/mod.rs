pub mod groq;
pub mod ollama;
pub mod reprompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::models::ConversationMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&ConversationMessage> for Message {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role.clone(),
            content: msg.content.clone(),
        }
    }
}

/// Text generation only. Replies from a provider never drive extraction or routing.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, system_prompt: &str, messages: &[Message]) -> anyhow::Result<String>;
}

/// Chat-completions message list with the system prompt first.
pub(crate) fn chat_messages(system_prompt: &str, messages: &[Message]) -> Vec<Value> {
    std::iter::once(json!({ "role": "system", "content": system_prompt }))
        .chain(
            messages
                .iter()
                .map(|msg| json!({ "role": msg.role, "content": msg.content })),
        )
        .collect()
}

/// The configured text generator, if any. Groq without an API key counts as unconfigured.
pub fn provider_from_config(config: &AppConfig) -> Option<Box<dyn LlmProvider>> {
    match config.llm_provider.as_str() {
        "groq" if config.groq_api_key.is_empty() => {
            tracing::warn!("LLM_PROVIDER=groq but GROQ_API_KEY is empty, using template replies");
            None
        }
        "groq" => {
            tracing::info!("using Groq LLM provider (model: {})", config.groq_model);
            Some(Box::new(groq::GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            )))
        }
        "ollama" => {
            tracing::info!("using Ollama LLM provider (url: {})", config.ollama_url);
            Some(Box::new(ollama::OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            )))
        }
        _ => {
            tracing::info!("no LLM provider configured, using template replies");
            None
        }
    }
}

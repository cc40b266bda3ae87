use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use log::info;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error for '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Prompt JSON parsing error for '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, friendly assistant. Answer clearly and concisely, \
and reply in the same language the user writes in.";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    /// Sent when a client starts a new chat.
    pub new_chat_message: String,
    /// Shown to the user when the model call fails.
    pub error_message: String,
    /// Used when the model answers with no text.
    pub fallback_reply: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            new_chat_message: "New chat started. How can I help you?".to_string(),
            error_message: "Sorry, I encountered an error. Please try again.".to_string(),
            fallback_reply: "Sorry, I couldn't process your request.".to_string(),
        }
    }
}

pub fn load_prompts(path: &str) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(path).map_err(|source| PromptError::Io {
        path: path.to_string(),
        source,
    })?;
    let config: PromptConfig = serde_json::from_str(&file_content).map_err(|source| PromptError::Json {
        path: path.to_string(),
        source,
    })?;
    info!("Loaded prompt configuration from: {}", path);
    Ok(Arc::new(config))
}

/// Assembles the text sent to the model for one user turn.
///
/// Without context the message follows the system prompt directly; with
/// context it is wrapped together with the retrieved turns, and the topic
/// summary (if any) leads the block.
pub fn build_prompt(
    config: &PromptConfig,
    message: &str,
    context: &str,
    summary: Option<&str>
) -> String {
    let mut context_prompt = message.to_string();
    if !context.is_empty() {
        context_prompt = format!(
            "Previous conversation context:\n{}\n\nCurrent message: {}",
            context,
            message
        );
        if let Some(summary) = summary {
            context_prompt = format!("{}\n\n{}", summary, context_prompt);
        }
    }

    format!("{}\n{}", config.system_prompt, context_prompt)
}

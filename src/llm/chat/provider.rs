use async_trait::async_trait;
use std::error::Error as StdError;
use log::info;

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ LlmConfig, LlmType };
use rllm::chat::{ ChatMessage, ChatRole, MessageType };
use rllm::builder::{ LLMBackend, LLMBuilder };
use rllm::LLMProvider;

fn backend_for(llm_type: LlmType) -> LLMBackend {
    match llm_type {
        LlmType::Ollama => LLMBackend::Ollama,
        LlmType::OpenAI => LLMBackend::OpenAI,
        LlmType::Anthropic => LLMBackend::Anthropic,
        LlmType::Gemini => LLMBackend::Google,
        LlmType::DeepSeek => LLMBackend::DeepSeek,
        LlmType::XAI => LLMBackend::XAI,
        LlmType::Groq => LLMBackend::Groq,
    }
}

fn default_model(llm_type: LlmType) -> &'static str {
    match llm_type {
        LlmType::Ollama => "llama3",
        LlmType::OpenAI => "gpt-4o-mini",
        LlmType::Anthropic => "claude-3-5-haiku-latest",
        LlmType::Gemini => "gemini-2.5-flash",
        LlmType::DeepSeek => "deepseek-chat",
        LlmType::XAI => "grok-2-latest",
        LlmType::Groq => "llama-3.1-8b-instant",
    }
}

/// Non-streaming chat client for every supported backend, built on `rllm`.
pub struct RllmChatClient {
    llm: Box<dyn LLMProvider + Send + Sync>,
    llm_type: LlmType,
    model: String,
    base_url: Option<String>,
}

impl RllmChatClient {
    pub fn new(
        llm_type: LlmType,
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>
    ) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_model = model.unwrap_or_else(|| default_model(llm_type).to_string());

        let mut builder = LLMBuilder::new()
            .backend(backend_for(llm_type))
            .model(&chat_model)
            .stream(false);

        match api_key {
            Some(key) => {
                builder = builder.api_key(key);
            }
            None if llm_type != LlmType::Ollama => {
                return Err(format!("An API key is required for the {:?} chat backend", llm_type).into());
            }
            None => {}
        }
        if let Some(url) = &base_url {
            builder = builder.base_url(url);
        }

        let llm_provider = builder.build()?;

        Ok(Self {
            llm: llm_provider,
            llm_type,
            model: chat_model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Self::new(
            config.llm_type,
            config.api_key.clone(),
            config.completion_model.clone(),
            config.base_url.clone()
        )
    }
}

#[async_trait]
impl ChatClient for RllmChatClient {
    async fn complete(
        &self,
        prompt: &str
    ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
        let messages = vec![ChatMessage {
            role: ChatRole::User,
            content: prompt.to_string(),
            message_type: MessageType::Text,
        }];
        info!(
            "RllmChatClient::complete() → backend={:?} model={} base_url={:?}",
            self.llm_type,
            self.model,
            self.base_url
        );
        let resp = self.llm.chat(&messages).await?;
        let text = resp
            .text()
            .map(|s| s.to_string())
            .unwrap_or_default();
        Ok(CompletionResponse { response: text })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}

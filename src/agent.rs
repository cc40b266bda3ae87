use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::history::initialize_blob_store;
use crate::llm::chat::{ ChatClient, new_client as new_chat_client };
use crate::llm::{ LlmConfig, LlmType };
use crate::memory::{ ConversationStore, MemoryConfig };
use crate::models::chat::{ ChatMessage, Role };

use log::{ info, warn, error, debug };
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

static BOLD_MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static HTML_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("chat model call failed: {0}")]
    Chat(Box<dyn StdError + Send + Sync>),
    #[error("conversation was cleared before the reply arrived")]
    StaleReply,
}

/// Strips `**bold**` markers and HTML tags from a model reply.
fn clean_reply(raw: &str) -> String {
    let unbolded = BOLD_MARKERS.replace_all(raw, "$1");
    HTML_TAGS.replace_all(&unbolded, "").trim().to_string()
}

/// One chat session: the conversation store plus the model it talks to.
///
/// The store sits behind a single-writer lock. A user turn is appended and
/// its context selected under one write-then-read critical section; the model
/// call runs with no lock held, and the reply is only appended if no `clear`
/// or reload happened in the meantime.
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: Arc<PromptConfig>,
    store: RwLock<ConversationStore>,
    context_max_chars: usize,
    recent_context_count: usize,
}

impl ChatAgent {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        store: ConversationStore,
        context_max_chars: usize,
        recent_context_count: usize
    ) -> Self {
        Self {
            chat_client,
            prompt_config,
            store: RwLock::new(store),
            context_max_chars,
            recent_context_count,
        }
    }

    fn initialize_chat_client(args: &Args) -> Result<Arc<dyn ChatClient>, Box<dyn StdError + Send + Sync>> {
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse::<LlmType>()?,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={:?}",
            args.chat_llm_type,
            chat_client.get_model(),
            chat_config.base_url.as_deref().unwrap_or("adapter default")
        );
        Ok(chat_client)
    }

    pub async fn from_args(args: &Args) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        let chat_client = Self::initialize_chat_client(args)?;
        let prompt_config = match &args.prompts_path {
            Some(path) => prompt::load_prompts(path)?,
            None => {
                info!("No prompts file configured; using built-in prompts.");
                Arc::new(PromptConfig::default())
            }
        };
        let blob_store = initialize_blob_store(args)?;
        let store = ConversationStore::hydrate(MemoryConfig::from(args), blob_store).await;

        Ok(
            Self::new(
                chat_client,
                prompt_config,
                store,
                args.context_max_chars,
                args.recent_context_count
            )
        )
    }

    pub fn prompt_config(&self) -> &PromptConfig {
        &self.prompt_config
    }

    /// Records the user turn, asks the model with retrieved context, records
    /// and returns the cleaned reply.
    pub async fn process_message(&self, message: &str) -> Result<String, AgentError> {
        if message.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let (generation, prompt_text) = {
            let mut store = self.store.write().await;
            store.add_message(Role::User, message).await;
            let store = store.downgrade();

            let budget = self.context_max_chars.min(store.config().max_context_length);
            let context = store.get_relevant_context(message, budget);
            let summary = store.get_conversation_summary();
            debug!(
                "Prompt context: {} chars, summary={}",
                context.chars().count(),
                summary.is_some()
            );
            (
                store.generation(),
                prompt::build_prompt(&self.prompt_config, message, &context, summary.as_deref()),
            )
        };

        let completion = self.chat_client.complete(&prompt_text).await.map_err(|e| {
            error!("LLM interaction error: {}", e);
            AgentError::Chat(e)
        })?;

        let mut reply = clean_reply(&completion.response);
        if reply.is_empty() {
            warn!("Model returned an empty reply; using fallback text");
            reply = self.prompt_config.fallback_reply.clone();
        }

        let mut store = self.store.write().await;
        if store.generation() != generation {
            warn!("Discarding reply for a conversation that was reset mid-flight");
            return Err(AgentError::StaleReply);
        }
        store.add_message(Role::Bot, &reply).await;
        Ok(reply)
    }

    pub async fn clear(&self) {
        self.store.write().await.clear().await;
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.store.read().await.messages().iter().map(ChatMessage::from).collect()
    }

    pub async fn recent_context(&self) -> String {
        self.store.read().await.get_recent_context(self.recent_context_count)
    }

    pub async fn summary(&self) -> Option<String> {
        self.store.read().await.get_conversation_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ BlobStore, MemoryBlobStore, PersistenceError };
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::{ Duration, Instant };
    use tokio::sync::Notify;

    #[derive(Default)]
    struct ScriptedChatClient {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChatClient {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self { reply: reply.to_string(), ..Self::default() })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedChatClient {
        async fn complete(
            &self,
            prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(CompletionResponse { response: self.reply.clone() })
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }
    }

    struct FailingChatClient;

    #[async_trait]
    impl ChatClient for FailingChatClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            Err("upstream 503".into())
        }

        fn get_model(&self) -> String {
            "failing".to_string()
        }
    }

    /// Blocks inside `complete` until released.
    #[derive(Default)]
    struct GatedChatClient {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ChatClient for GatedChatClient {
        async fn complete(
            &self,
            _prompt: &str
        ) -> Result<CompletionResponse, Box<dyn StdError + Send + Sync>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(CompletionResponse { response: "late".to_string() })
        }

        fn get_model(&self) -> String {
            "gated".to_string()
        }
    }

    /// Takes `delay` to answer every call, like a backend on a slow link.
    struct SlowBlobStore {
        delay: Duration,
        inner: MemoryBlobStore,
    }

    #[async_trait]
    impl BlobStore for SlowBlobStore {
        async fn read(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            tokio::time::sleep(self.delay).await;
            self.inner.read(key).await
        }

        async fn write(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(key, value).await
        }
    }

    fn agent_with(client: Arc<dyn ChatClient>) -> ChatAgent {
        let prompts = PromptConfig { system_prompt: "SYS".to_string(), ..PromptConfig::default() };
        let store = ConversationStore::new(MemoryConfig::default(), Arc::new(MemoryBlobStore::new()));
        ChatAgent::new(client, Arc::new(prompts), store, 3000, 10)
    }

    #[test]
    fn cleans_markup_from_replies() {
        assert_eq!(clean_reply("  **Hi** <b>there</b>!  "), "Hi there!");
        assert_eq!(clean_reply("<br/>"), "");
    }

    #[tokio::test]
    async fn records_both_turns() {
        let client = ScriptedChatClient::replying("**Hello!** How can I help?");
        let agent = agent_with(client.clone());

        let reply = agent.process_message("hello bot").await.unwrap();
        assert_eq!(reply, "Hello! How can I help?");

        let history = agent.history().await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hello bot");
        assert_eq!(history[1].role, Role::Bot);
        assert_eq!(history[1].content, "Hello! How can I help?");
    }

    #[tokio::test]
    async fn prompt_carries_current_turn_as_context() {
        let client = ScriptedChatClient::replying("sure");
        let agent = agent_with(client.clone());

        agent.process_message("my cat is called Miso").await.unwrap();
        agent.process_message("what is my cat called?").await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].starts_with("SYS\nPrevious conversation context:\n"));
        assert!(prompts[1].contains("user: my cat is called Miso"));
        assert!(prompts[1].ends_with("Current message: what is my cat called?"));
    }

    #[tokio::test]
    async fn empty_message_is_rejected_without_recording() {
        let agent = agent_with(ScriptedChatClient::replying("unused"));
        assert!(matches!(agent.process_message("   ").await, Err(AgentError::EmptyMessage)));
        assert!(agent.history().await.is_empty());
    }

    #[tokio::test]
    async fn model_failure_keeps_only_user_turn() {
        let agent = agent_with(Arc::new(FailingChatClient));
        let result = agent.process_message("anyone there?").await;
        assert!(matches!(result, Err(AgentError::Chat(_))));

        let history = agent.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn blank_reply_falls_back() {
        let agent = agent_with(ScriptedChatClient::replying("<p></p>"));
        let reply = agent.process_message("hi").await.unwrap();
        assert_eq!(reply, PromptConfig::default().fallback_reply);
    }

    #[tokio::test]
    async fn reply_after_clear_is_discarded() {
        let client = Arc::new(GatedChatClient::default());
        let agent = Arc::new(agent_with(client.clone()));

        let pending = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.process_message("slow question").await })
        };

        client.entered.notified().await;
        agent.clear().await;
        client.release.notify_one();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(AgentError::StaleReply)));
        assert!(agent.history().await.is_empty());
    }

    #[tokio::test]
    async fn recent_context_and_summary_delegate_to_store() {
        let agent = agent_with(ScriptedChatClient::replying("noted"));
        agent.process_message("first").await.unwrap();
        assert_eq!(agent.recent_context().await, "user: first\nbot: noted");
        assert_eq!(agent.summary().await, None);
    }

    #[tokio::test]
    async fn slow_persistence_does_not_stall_other_tasks() {
        let blobs = MemoryBlobStore::new();
        let slow = SlowBlobStore { delay: Duration::from_millis(300), inner: blobs.clone() };
        let store = ConversationStore::new(MemoryConfig::default(), Arc::new(slow));
        let agent = Arc::new(
            ChatAgent::new(
                ScriptedChatClient::replying("ok"),
                Arc::new(PromptConfig::default()),
                store,
                3000,
                10
            )
        );

        let turn = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.process_message("hello").await })
        };

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(
            started.elapsed() < Duration::from_millis(200),
            "timer waited {:?} behind a save",
            started.elapsed()
        );

        assert_eq!(turn.await.unwrap().unwrap(), "ok");
        let saved = blobs.read(crate::memory::DEFAULT_HISTORY_KEY).await.unwrap().unwrap();
        assert!(saved.contains("hello"));
        assert!(saved.contains("\"bot\""));
    }
}

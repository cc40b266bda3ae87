use super::{ selector, summary, MemoryConfig };
use crate::history::{ BlobStore, MemoryBlobStore, PersistenceError };
use crate::memory::embedding::embed;
use crate::models::chat::{ ConversationMessage, Role };
use chrono::Utc;
use log::{ debug, error, info, warn };
use std::sync::Arc;

/// Turns returned by a plain recent-context lookup unless configured otherwise.
pub const DEFAULT_RECENT_COUNT: usize = 10;

/// Append-only, timestamp-ordered conversation log.
///
/// The only mutations are [`add_message`](Self::add_message) and
/// [`clear`](Self::clear); both persist the full log before returning.
/// Persistence failures are logged and the store keeps working in memory.
pub struct ConversationStore {
    messages: Vec<ConversationMessage>,
    config: MemoryConfig,
    persistence: Arc<dyn BlobStore>,
    generation: u64,
}

impl ConversationStore {
    pub fn new(config: MemoryConfig, persistence: Arc<dyn BlobStore>) -> Self {
        Self {
            messages: Vec::new(),
            config,
            persistence,
            generation: 0,
        }
    }

    /// Creates a store and loads whatever is persisted under the configured key.
    pub async fn hydrate(config: MemoryConfig, persistence: Arc<dyn BlobStore>) -> Self {
        let mut store = Self::new(config, persistence);
        store.load().await;
        store
    }

    pub fn in_memory(config: MemoryConfig) -> Self {
        Self::new(config, Arc::new(MemoryBlobStore::new()))
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Bumped whenever the log is replaced wholesale (`clear`, `load`).
    /// A caller holding an older value is looking at a conversation that no
    /// longer exists.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn add_message(&mut self, role: Role, content: &str) {
        self.add_message_at(role, content, Utc::now().timestamp_millis()).await;
    }

    pub async fn add_message_at(&mut self, role: Role, content: &str, timestamp: i64) {
        let timestamp = match self.messages.last() {
            Some(last) if timestamp < last.timestamp => {
                debug!(
                    "Clamping out-of-order timestamp {} to {}",
                    timestamp,
                    last.timestamp
                );
                last.timestamp
            }
            _ => timestamp,
        };

        self.messages.push(ConversationMessage::new(role, content, timestamp));
        self.persist().await;
    }

    pub async fn clear(&mut self) {
        self.messages.clear();
        self.generation += 1;
        info!("Conversation history cleared");
        self.persist().await;
    }

    /// Last `count` turns, formatted and newline-joined, without ranking.
    pub fn get_recent_context(&self, count: usize) -> String {
        let start = self.messages.len().saturating_sub(count);
        self.messages[start..]
            .iter()
            .map(ConversationMessage::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn get_relevant_context(&self, query: &str, max_chars: usize) -> String {
        selector::get_relevant_context(self, query, max_chars, Utc::now().timestamp_millis())
    }

    pub fn get_conversation_summary(&self) -> Option<String> {
        summary::summarize(self)
    }

    pub async fn save(&self) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(&self.messages)?;
        self.persistence.write(&self.config.storage_key, &json).await
    }

    /// Replaces the in-memory log with the persisted one and returns the
    /// number of turns loaded. A missing key, unreadable backend or malformed
    /// blob all leave an empty store.
    pub async fn load(&mut self) -> usize {
        self.generation += 1;
        self.messages = match self.persistence.read(&self.config.storage_key).await {
            Ok(Some(json)) =>
                match serde_json::from_str::<Vec<ConversationMessage>>(&json) {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!("Error loading chat history (malformed JSON): {}", e);
                        Vec::new()
                    }
                }
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Error loading chat history: {}", e);
                Vec::new()
            }
        };

        for msg in self.messages.iter_mut().filter(|m| m.embedding.is_empty()) {
            msg.embedding = embed(&msg.content);
        }
        if !self.messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp) {
            warn!("Persisted history was not in timestamp order; re-sorting");
            self.messages.sort_by_key(|m| m.timestamp);
        }

        info!("Loaded {} messages from history", self.messages.len());
        self.messages.len()
    }

    async fn persist(&self) {
        if let Err(e) = self.save().await {
            error!("Error saving chat history: {}", e);
        }
    }
}

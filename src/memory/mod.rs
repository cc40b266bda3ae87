//! Conversation memory: term-frequency embeddings, cosine scoring, the
//! persisted turn log, budgeted context selection and topic summaries.

pub mod embedding;
pub mod selector;
pub mod similarity;
pub mod store;
pub mod summary;

pub use self::embedding::{ embed, SparseVector };
pub use self::selector::{ get_relevant_context, DEFAULT_CONTEXT_CHARS };
pub use self::similarity::cosine;
pub use self::store::{ ConversationStore, DEFAULT_RECENT_COUNT };
pub use self::summary::summarize;

use crate::cli::Args;

pub const DEFAULT_HISTORY_KEY: &str = "vectorChatHistory";

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Hard cap on any context budget handed to the selector.
    pub max_context_length: usize,
    pub max_recent_messages: usize,
    /// Exclusive floor a similarity-ranked turn must exceed.
    pub similarity_threshold: f64,
    pub storage_key: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_context_length: 4000,
            max_recent_messages: 10,
            similarity_threshold: 0.3,
            storage_key: DEFAULT_HISTORY_KEY.to_string(),
        }
    }
}

impl From<&Args> for MemoryConfig {
    fn from(args: &Args) -> Self {
        Self {
            max_context_length: args.max_context_length,
            max_recent_messages: args.max_recent_messages,
            similarity_threshold: args.similarity_threshold,
            storage_key: args.history_key.clone(),
        }
    }
}

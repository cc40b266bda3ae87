use crate::memory::embedding::{ embed, SparseVector };
use serde::{ Serialize, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Bot => "bot",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One turn of the conversation log, exactly as it is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
    #[serde(default)]
    pub embedding: SparseVector,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: i64) -> Self {
        let content = content.into();
        let embedding = embed(&content);
        Self { role, content, timestamp, embedding }
    }

    /// `"<role>: <content>"`, the line format used for every context string.
    pub fn format_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// Display-only view of a turn sent to UI clients; the embedding stays server side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
            timestamp: msg.timestamp,
        }
    }
}

//! Core data models shared by the store, the chat service, and the HTTP layer.

use serde::{Deserialize, Serialize};

/// A persisted conversation about one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatSession {
    pub id: String,
    pub pdf_name: String,
    pub pdf_url: String,
    pub created_at: i64,
    pub user_id: String,
    /// Document key used to scope context retrieval.
    pub file_key: String,
}

/// Who authored a stored message.
///
/// Assistant replies are stored as `system`, which is what the message log
/// has always used for model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// A row of the append-only message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: String,
    pub content: String,
    pub created_at: i64,
    pub role: MessageRole,
}

/// A message about to be appended to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// One turn of the conversation as sent by the client.
///
/// The role is taken as-is; only `"user"` is treated as user-authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

impl Turn {
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// A chunk of an ingested document's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub file_key: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}

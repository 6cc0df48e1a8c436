//! Conversation value types shared by the relay pipeline and the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// A single turn of a conversation, exactly as it is sent upstream and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A persisted conversation, keyed by `history_id`.
///
/// `messages` is always written wholesale: a continuing session replaces the
/// stored list with the caller's prompt plus the new assistant reply, it never
/// merges with what was there before.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub history_id: String,
    pub user_id: i64,
    pub model_name: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// Build a fresh record with a new UUIDv4 identifier and both timestamps
    /// set to now.
    pub fn new(user_id: i64, model_name: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        let now = Utc::now();
        Self {
            history_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            model_name: model_name.into(),
            messages,
            created_at: now,
            updated_at: now,
        }
    }
}

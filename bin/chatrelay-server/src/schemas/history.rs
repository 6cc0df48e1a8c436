use chatrelay_core::{ChatMessage, ConversationRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::schemas::chat::MessageDoc;

/// Title shown for a conversation that has no messages.
pub const UNTITLED: &str = "New conversation";
const TITLE_MAX_CHARS: usize = 30;

/// Request body for `POST /api/chat-history`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaveHistoryRequest {
    pub model: String,
    #[schema(value_type = Vec<MessageDoc>)]
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SaveHistoryResponse {
    pub message: String,
    pub history_id: String,
}

/// One row of `GET /api/chat-histories`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistorySummary {
    pub history_id: String,
    pub model: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryListResponse {
    pub histories: Vec<HistorySummary>,
}

/// Response body for `GET /api/chat-history/{history_id}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryDetail {
    pub history_id: String,
    pub model: String,
    #[schema(value_type = Vec<MessageDoc>)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl From<&ConversationRecord> for HistorySummary {
    fn from(record: &ConversationRecord) -> Self {
        Self {
            history_id: record.history_id.clone(),
            model: record.model_name.clone(),
            title: title_of(&record.messages),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<ConversationRecord> for HistoryDetail {
    fn from(record: ConversationRecord) -> Self {
        Self {
            history_id: record.history_id,
            model: record.model_name,
            messages: record.messages,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// First message's content, cut to 30 characters with a trailing `...`.
pub fn title_of(messages: &[ChatMessage]) -> String {
    let Some(first) = messages.first() else {
        return UNTITLED.to_owned();
    };
    let mut chars = first.content.char_indices();
    match chars.nth(TITLE_MAX_CHARS) {
        Some((cut, _)) => format!("{}...", &first.content[..cut]),
        None => first.content.clone(),
    }
}

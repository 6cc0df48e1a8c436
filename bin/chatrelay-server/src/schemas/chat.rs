use chatrelay_core::ChatMessage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// OpenAPI shape of a conversation message.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageDoc {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Request body for `POST /api/stream-chat`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StreamChatRequest {
    /// Backend model identifier.
    pub model: String,
    /// Full conversation transcript to send to the model.
    #[schema(value_type = Vec<MessageDoc>)]
    pub messages: Vec<ChatMessage>,
    /// Backend sampling options, forwarded verbatim (`stream` is always forced on).
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub options: Option<Map<String, Value>>,
    /// Existing conversation to overwrite with this exchange.
    #[serde(default)]
    pub history_id: Option<String>,
}

impl StreamChatRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model must not be empty".into());
        }
        if self.messages.is_empty() {
            return Err("messages must not be empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn options_and_history_id_are_optional() {
        let req: StreamChatRequest = serde_json::from_str(
            r#"{"model":"m","messages":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();
        assert!(req.options.is_none());
        assert!(req.history_id.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn empty_model_or_messages_is_invalid() {
        let req: StreamChatRequest =
            serde_json::from_str(r#"{"model":" ","messages":[{"role":"user","content":"hi"}]}"#)
                .unwrap();
        assert!(req.validate().is_err());

        let req: StreamChatRequest =
            serde_json::from_str(r#"{"model":"m","messages":[]}"#).unwrap();
        assert!(req.validate().is_err());
    }
}

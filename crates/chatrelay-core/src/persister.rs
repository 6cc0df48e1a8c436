//! Conversation persistence triggered by the terminal chunk of a session.
//!
//! Persistence is one attempt, no retries. A new session creates a record;
//! a continuing session (one that names an existing `history_id`) overwrites
//! the record's `messages` wholesale with `prompt ++ [assistant(reply)]`.
//! Nothing is appended to what was stored before, so a client that wants
//! cumulative history has to resend the full transcript as its prompt. There
//! is no version check either: concurrent sessions on the same identifier
//! race and the later save wins.
//!
//! Every failure here degrades to "relay the original terminal chunk without
//! `history_id`". The stream itself is never aborted.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::session::SessionContext;
use crate::store::ConversationStore;
use crate::types::{ChatMessage, ConversationRecord};

/// Name of the field injected into the terminal event.
pub const HISTORY_ID_FIELD: &str = "history_id";

/// Outcome of [`HistoryPersister::finalize`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Finalized {
    /// Identifier of the record that was created or overwritten.
    pub history_id: Option<String>,
    /// Replacement bytes for the terminal chunk, when the id was injected.
    pub rewritten: Option<Bytes>,
}

pub struct HistoryPersister<S> {
    store: Arc<S>,
}

impl<S> Clone for HistoryPersister<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ConversationStore> HistoryPersister<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Persist the finished session and rewrite its terminal event.
    ///
    /// `event` is the parsed terminal object and `raw` the chunk it came from;
    /// the original line terminator of `raw` is kept on the rewritten chunk.
    pub async fn finalize(
        &self,
        session: &SessionContext,
        event: Map<String, Value>,
        raw: &[u8],
    ) -> Finalized {
        let history_id = match self
            .persist(
                session.user_id,
                &session.model_name,
                &session.prompt,
                session.accumulated(),
                session.history_id.as_deref(),
            )
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(
                    error = %e,
                    user_id = session.user_id,
                    history_id = ?session.history_id,
                    "failed to persist chat history; terminal chunk relayed unchanged"
                );
                return Finalized::default();
            }
        };

        match inject_history_id(event, &history_id, trailing_whitespace(raw)) {
            Ok(rewritten) => Finalized {
                history_id: Some(history_id),
                rewritten: Some(rewritten),
            },
            Err(e) => {
                warn!(error = %e, %history_id, "failed to re-serialize terminal event");
                Finalized {
                    history_id: Some(history_id),
                    rewritten: None,
                }
            }
        }
    }

    /// Create or overwrite the conversation record and return its identifier.
    pub async fn persist(
        &self,
        user_id: i64,
        model_name: &str,
        prompt: &[ChatMessage],
        accumulated: &str,
        existing_history_id: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut messages = Vec::with_capacity(prompt.len() + 1);
        messages.extend_from_slice(prompt);
        messages.push(ChatMessage::assistant(accumulated));

        match existing_history_id {
            None => {
                let record = ConversationRecord::new(user_id, model_name, messages);
                let id = self.store.create(record).await?;
                info!(history_id = %id, user_id, "chat history created");
                Ok(id)
            }
            Some(id) => {
                let mut record = self.store.get_by_id(id).await?;
                record.messages = messages;
                record.updated_at = Utc::now();
                self.store.update(record).await?;
                info!(history_id = %id, user_id, "chat history overwritten");
                Ok(id.to_owned())
            }
        }
    }
}

/// Add `history_id` to `event` and serialize it back to wire bytes, followed
/// by `terminator`.
pub fn inject_history_id(
    mut event: Map<String, Value>,
    history_id: &str,
    terminator: &[u8],
) -> Result<Bytes, serde_json::Error> {
    event.insert(
        HISTORY_ID_FIELD.to_owned(),
        Value::String(history_id.to_owned()),
    );
    let mut out = serde_json::to_vec(&event)?;
    out.extend_from_slice(terminator);
    Ok(Bytes::from(out))
}

fn trailing_whitespace(raw: &[u8]) -> &[u8] {
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &raw[end..]
}

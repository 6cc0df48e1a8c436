use std::collections::HashMap;

use tokio::sync::RwLock;

use super::ConversationStore;
use crate::error::StoreError;
use crate::types::ConversationRecord;

/// In-process [`ConversationStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, ConversationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl ConversationStore for MemoryStore {
    async fn create(&self, record: ConversationRecord) -> Result<String, StoreError> {
        let id = record.history_id.clone();
        self.records.write().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn get_by_id(&self, history_id: &str) -> Result<ConversationRecord, StoreError> {
        self.records
            .read()
            .await
            .get(history_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(history_id.to_owned()))
    }

    async fn update(&self, record: ConversationRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.history_id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(StoreError::NotFound(record.history_id)),
        }
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<ConversationRecord>, StoreError> {
        let mut out: Vec<ConversationRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn delete(&self, history_id: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(history_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(history_id.to_owned()))
    }
}

//! Shared fixtures for the chatrelay-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use chatrelay_core::{
    ChatMessage, ConversationRecord, ConversationStore, MemoryStore, RelayError, RelaySink,
    StoreError, UpstreamError,
};
use futures::stream::{self, Stream};

/// Sink that records every flushed chunk; optionally fails on the n-th write.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub written: Vec<Bytes>,
    pub flushes: usize,
    pub fail_on_write: Option<usize>,
}

impl RecordingSink {
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on_write: Some(n),
            ..Self::default()
        }
    }

    pub fn concat(&self) -> Vec<u8> {
        self.written.iter().flat_map(|b| b.iter().copied()).collect()
    }
}

impl RelaySink for &mut RecordingSink {
    async fn write(&mut self, chunk: Bytes) -> Result<usize, RelayError> {
        if self.fail_on_write == Some(self.written.len()) {
            return Err(RelayError::Disconnected);
        }
        let len = chunk.len();
        self.written.push(chunk);
        Ok(len)
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Store wrapper that counts calls and can be told to fail every write.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub fail_writes: bool,
    pub creates: AtomicUsize,
    pub updates: AtomicUsize,
}

impl ScriptedStore {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }
}

impl ConversationStore for ScriptedStore {
    async fn create(&self, record: ConversationRecord) -> Result<String, StoreError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.create(record).await
    }

    async fn get_by_id(&self, history_id: &str) -> Result<ConversationRecord, StoreError> {
        self.inner.get_by_id(history_id).await
    }

    async fn update(&self, record: ConversationRecord) -> Result<(), StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.update(record).await
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<ConversationRecord>, StoreError> {
        self.inner.list_by_user(user_id).await
    }

    async fn delete(&self, history_id: &str) -> Result<(), StoreError> {
        self.inner.delete(history_id).await
    }
}

/// Upstream stream made of the given literal chunks.
pub fn upstream(parts: &[&str]) -> impl Stream<Item = Result<Bytes, UpstreamError>> + Send + Unpin {
    let items: Vec<Result<Bytes, UpstreamError>> = parts
        .iter()
        .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
        .collect();
    stream::iter(items)
}

/// Like [`upstream`], but also counts how many chunks were pulled.
pub fn counted_upstream(
    parts: &[&str],
    pulled: Arc<AtomicUsize>,
) -> impl Stream<Item = Result<Bytes, UpstreamError>> + Send + Unpin {
    let items: Vec<Bytes> = parts
        .iter()
        .map(|p| Bytes::copy_from_slice(p.as_bytes()))
        .collect();
    stream::iter(items.into_iter().map(move |b| {
        pulled.fetch_add(1, Ordering::SeqCst);
        Ok(b)
    }))
}

pub fn hi_prompt() -> Vec<ChatMessage> {
    vec![ChatMessage::user("hi")]
}

pub const HELLO_EVENTS: [&str; 3] = [
    "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"He\"},\"done\":false}\n",
    "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"llo\"},\"done\":false}\n",
    "{\"model\":\"m\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"eval_count\":2}\n",
];

pub fn json(bytes: &[u8]) -> serde_json::Value {
    serde_json::from_slice(bytes).expect("valid json frame")
}

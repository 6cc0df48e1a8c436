//! Conversation storage abstraction.
//!
//! [`ConversationStore`] defines the interface the relay needs for persisting
//! completed conversations. The default implementation is
//! [`sqlite::SqliteStore`]; [`memory::MemoryStore`] keeps everything in a map
//! and is handy for tests and throwaway deployments.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required.
//!
//! [`UserStore`] holds the accounts that sign in and receive bearer tokens.
//!
//! Writes are last-writer-wins: `update` replaces the stored record with no
//! version check, so two sessions finalizing against the same history
//! identifier race and the later save is what remains.

pub mod memory;
pub mod sqlite;
pub mod users;

use std::future::Future;

use crate::error::StoreError;
use crate::types::ConversationRecord;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use users::{NewUser, User, UserStore};

pub trait ConversationStore: Send + Sync + 'static {
    /// Insert a new record and return its history identifier.
    fn create(
        &self,
        record: ConversationRecord,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Load a record, failing with [`StoreError::NotFound`] when absent.
    fn get_by_id(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<ConversationRecord, StoreError>> + Send;

    /// Overwrite an existing record in full.
    fn update(
        &self,
        record: ConversationRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All records owned by `user_id`, newest first.
    fn list_by_user(
        &self,
        user_id: i64,
    ) -> impl Future<Output = Result<Vec<ConversationRecord>, StoreError>> + Send;

    /// Remove a record. Deleting an absent record is a [`StoreError::NotFound`].
    fn delete(&self, history_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

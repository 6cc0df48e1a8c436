//! SQLite implementation of [`ConversationStore`].
//!
//! Uses [`sqlx`] with the `sqlite` feature. Migrations are run automatically
//! on startup via [`SqliteStore::connect`].
//!
//! # Migrations path
//!
//! `sqlx::migrate!("./migrations")` resolves the path **at compile time**
//! relative to `CARGO_MANIFEST_DIR` (the crate root), so the directory is
//! embedded into the binary. The database file location is decided at runtime
//! by the URL handed to [`SqliteStore::connect`].
//!
//! # Queries
//!
//! The `sqlx::query` (runtime-verified) form is used so that no
//! `DATABASE_URL` environment variable is needed at compile time.
//!
//! `messages` is stored as a JSON array in a `TEXT` column and timestamps as
//! RFC3339 strings.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::ConversationStore;
use crate::error::StoreError;
use crate::types::{ChatMessage, ConversationRecord};

type HistoryRow = (String, i64, String, String, String, String);

/// SQLite-backed conversation store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://chatrelay.db?mode=rwc"`. Use [`SqliteStore::in_memory`] for
    /// a private in-memory database.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(pool).await
    }

    /// A fresh in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, StoreError> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub(super) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool; subsequent queries fail with `PoolClosed`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl ConversationStore for SqliteStore {
    async fn create(&self, record: ConversationRecord) -> Result<String, StoreError> {
        let messages = serde_json::to_string(&record.messages)?;
        sqlx::query(
            "INSERT INTO chat_histories (history_id, user_id, model_name, messages, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&record.history_id)
        .bind(record.user_id)
        .bind(&record.model_name)
        .bind(&messages)
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(record.history_id)
    }

    async fn get_by_id(&self, history_id: &str) -> Result<ConversationRecord, StoreError> {
        let row: Option<HistoryRow> =
            sqlx::query_as(
                "SELECT history_id, user_id, model_name, messages, created_at, updated_at \
                 FROM chat_histories WHERE history_id = ?1",
            )
                .bind(history_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some(row) => from_row(row),
            None => Err(StoreError::NotFound(history_id.to_owned())),
        }
    }

    async fn update(&self, record: ConversationRecord) -> Result<(), StoreError> {
        let messages = serde_json::to_string(&record.messages)?;
        let result = sqlx::query(
            "UPDATE chat_histories SET user_id = ?1, model_name = ?2, messages = ?3, updated_at = ?4 \
             WHERE history_id = ?5",
        )
        .bind(record.user_id)
        .bind(&record.model_name)
        .bind(&messages)
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.history_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(record.history_id));
        }
        Ok(())
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT history_id, user_id, model_name, messages, created_at, updated_at \
             FROM chat_histories WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match from_row(row) {
                Ok(record) => out.push(record),
                Err(e) => tracing::warn!(user_id, error = %e, "skipping undecodable chat history row"),
            }
        }
        Ok(out)
    }

    async fn delete(&self, history_id: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM chat_histories WHERE history_id = ?1")
            .bind(history_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(history_id.to_owned()));
        }
        Ok(())
    }
}

fn from_row(
    (history_id, user_id, model_name, messages, created_at, updated_at): HistoryRow,
) -> Result<ConversationRecord, StoreError> {
    let messages: Vec<ChatMessage> = serde_json::from_str(&messages)?;
    Ok(ConversationRecord {
        created_at: parse_timestamp(&history_id, "created_at", &created_at),
        updated_at: parse_timestamp(&history_id, "updated_at", &updated_at),
        history_id,
        user_id,
        model_name,
        messages,
    })
}

pub(super) fn parse_timestamp(key: &str, column: &str, raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(key, column, raw, error = %e, "failed to parse timestamp; using now");
        Utc::now()
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips_messages() {
        let store = SqliteStore::in_memory().await.expect("in-memory db");
        let record = ConversationRecord::new(
            7,
            "qwen2:7b",
            vec![ChatMessage::user("hi"), ChatMessage::assistant("Hello")],
        );
        let id = store.create(record.clone()).await.unwrap();
        assert_eq!(id, record.history_id);

        let loaded = store.get_by_id(&id).await.unwrap();
        assert_eq!(loaded.messages, record.messages);
        assert_eq!(loaded.user_id, 7);
        assert_eq!(loaded.model_name, "qwen2:7b");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let err = store.get_by_id("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn update_replaces_messages() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut record = ConversationRecord::new(1, "m", vec![ChatMessage::user("first")]);
        store.create(record.clone()).await.unwrap();

        record.messages = vec![ChatMessage::user("second")];
        store.update(record.clone()).await.unwrap();

        let loaded = store.get_by_id(&record.history_id).await.unwrap();
        assert_eq!(loaded.messages, vec![ChatMessage::user("second")]);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = ConversationRecord::new(1, "m", vec![]);
        assert!(matches!(
            store.update(record).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_and_delete_are_scoped_to_user() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mine = ConversationRecord::new(1, "m", vec![ChatMessage::user("a")]);
        let theirs = ConversationRecord::new(2, "m", vec![ChatMessage::user("b")]);
        store.create(mine.clone()).await.unwrap();
        store.create(theirs.clone()).await.unwrap();

        let listed = store.list_by_user(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].history_id, mine.history_id);

        store.delete(&mine.history_id).await.unwrap();
        assert!(store.list_by_user(1).await.unwrap().is_empty());
        assert!(matches!(
            store.delete(&mine.history_id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn closed_pool_reports_database_error() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.close().await;
        let err = store
            .create(ConversationRecord::new(1, "m", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}

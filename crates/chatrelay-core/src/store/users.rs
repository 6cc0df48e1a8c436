//! Account storage for the users that sign in to the relay.
//!
//! Only the password hash is ever stored; hashing and verification happen in
//! the HTTP layer.

use std::future::Future;

use chrono::{DateTime, Utc};

use super::SqliteStore;
use super::sqlite::parse_timestamp;
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

pub trait UserStore: Send + Sync + 'static {
    /// Insert an account. A taken username or email is a
    /// [`StoreError::Conflict`].
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User, StoreError>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;
}

type UserRow = (i64, String, String, String, String);

const BY_USERNAME: &str =
    "SELECT id, username, email, password_hash, created_at FROM users WHERE username = ?1";
const BY_EMAIL: &str =
    "SELECT id, username, email, password_hash, created_at FROM users WHERE email = ?1";

impl UserStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(created_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(conflict_or_database)?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at,
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(BY_USERNAME)
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(user_from_row))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(BY_EMAIL)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(user_from_row))
    }
}

fn conflict_or_database(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            if db.message().contains("users.email") {
                StoreError::Conflict("email already registered".into())
            } else {
                StoreError::Conflict("username already exists".into())
            }
        }
        _ => StoreError::Database(e),
    }
}

fn user_from_row((id, username, email, password_hash, created_at): UserRow) -> User {
    let key = id.to_string();
    User {
        created_at: parse_timestamp(&key, "created_at", &created_at),
        id,
        username,
        email,
        password_hash,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn alice() -> NewUser {
        NewUser {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$2b$04$hash".into(),
        }
    }

    #[tokio::test]
    async fn created_user_can_be_found_by_either_key() {
        let store = SqliteStore::in_memory().await.unwrap();
        let created = store.create_user(alice()).await.unwrap();
        assert!(created.id > 0);

        let by_name = store.find_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(by_name.password_hash, "$2b$04$hash");

        let by_email = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.username, "alice");

        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_conflict() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.create_user(alice()).await.unwrap();

        let same_name = NewUser {
            email: "other@example.com".into(),
            ..alice()
        };
        let err = store.create_user(same_name).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(m) if m == "username already exists"));

        let same_email = NewUser {
            username: "alice2".into(),
            ..alice()
        };
        let err = store.create_user(same_email).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(m) if m == "email already registered"));
    }
}

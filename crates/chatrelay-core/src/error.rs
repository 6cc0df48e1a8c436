use thiserror::Error;

/// Failures of the upstream inference call.
///
/// `Unavailable` and `BadStatus` happen before any chunk has been yielded, so
/// callers can still answer with an ordinary error response. `Transport` is
/// only ever seen as an item of an already-open chunk stream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The HTTP client could not be constructed.
    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response (connect refused, timeout, ...).
    #[error("upstream unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    BadStatus { status: u16, body: String },

    /// The response body failed after streaming had started.
    #[error("upstream stream failed: {0}")]
    Transport(String),

    /// A non-streaming upstream response could not be decoded.
    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),
}

/// Failures of a [`crate::store::ConversationStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the requested history identifier.
    #[error("conversation not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The stored `messages` column could not be encoded or decoded.
    #[error("message serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures of a [`crate::relay::RelaySink`]. The only cause is the client
/// going away; nothing is retried.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("client disconnected")]
    Disconnected,
}

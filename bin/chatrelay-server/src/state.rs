//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use chatrelay_core::{SqliteStore, UpstreamClient};

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversation history store.
    pub store: Arc<SqliteStore>,
    /// Client for the inference backend.
    pub upstream: UpstreamClient,
}

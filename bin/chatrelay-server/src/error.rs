//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON-body HTTP response
//! with an appropriate status code.
//!
//! Internal errors (store, unexpected upstream failures) are logged with full
//! detail but only a generic message is returned to the caller.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatrelay_core::{StoreError, UpstreamError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the chatrelay-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The backend could not be reached or rejected the request before any
    /// stream was opened.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// Propagated from the conversation store.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is authenticated but does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => ServerError::NotFound(format!("chat history {id} not found")),
            StoreError::Conflict(m) => ServerError::BadRequest(m),
            other => ServerError::Store(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),

            ServerError::Upstream(e) => {
                error!(error = %e, "model request failed");
                upstream_status(e)
            }

            // Internal errors: log the full detail, keep it out of the body.
            ServerError::Store(e) => {
                error!(error = %e, "store error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

/// A backend error status is mirrored; everything else is a bad gateway.
fn upstream_status(e: &UpstreamError) -> (StatusCode, String) {
    match e {
        UpstreamError::BadStatus { status, .. } => {
            let code = StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY);
            (code, format!("model request failed with status {status}"))
        }
        UpstreamError::Unavailable(_) => (
            StatusCode::BAD_GATEWAY,
            "model backend unavailable".to_owned(),
        ),
        _ => (StatusCode::BAD_GATEWAY, "model request failed".to_owned()),
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let err: ServerError = StoreError::NotFound("abc".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[traced_test]
    async fn store_failure_is_a_generic_500() {
        let err: ServerError = StoreError::Database(sqlx::Error::PoolClosed).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(logs_contain("store error"));
    }

    #[test]
    fn store_conflict_is_a_bad_request() {
        let err: ServerError = StoreError::Conflict("username already exists".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_error_status_is_mirrored() {
        let err = ServerError::Upstream(UpstreamError::BadStatus {
            status: 404,
            body: "model not found".into(),
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = ServerError::Upstream(UpstreamError::BadStatus {
            status: 302,
            body: String::new(),
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn invalid_upstream_payload_is_bad_gateway() {
        let err = ServerError::Upstream(UpstreamError::InvalidResponse("eof".into()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}

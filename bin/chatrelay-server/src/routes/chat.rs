//! Streaming chat relay (`POST /api/stream-chat`).
//!
//! The upstream request is opened before any response is produced, so a
//! backend that is down or rejects the request yields an ordinary JSON error.
//! Once it accepts, the response is an event stream fed by a
//! [`RelayPipeline`] running on its own task; the handler returns as soon as
//! the headers can go out.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::framing::ndjson_frames;
use chatrelay_core::relay::event_stream_headers;
use chatrelay_core::{
    ChannelSink, ConversationStore, EventInterceptor, HistoryPersister, RelayPipeline,
    SessionContext, StoreError,
};
use tracing::{Instrument, info, info_span};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::AuthUser;
use crate::schemas::chat::{MessageDoc, StreamChatRequest};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(stream_chat),
    components(schemas(StreamChatRequest, MessageDoc))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/stream-chat", post(stream_chat))
}

#[utoipa::path(
    post,
    path = "/api/stream-chat",
    tag = "chat",
    request_body = StreamChatRequest,
    responses(
        (status = 200, description = "NDJSON event stream; the final event carries `history_id`", body = String, content_type = "text/event-stream"),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "history_id belongs to another user"),
        (status = 502, description = "Model backend unavailable"),
    ),
    security(("bearer" = []))
)]
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<StreamChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate().map_err(ServerError::BadRequest)?;

    info!(
        user_id = user.id,
        model = %req.model,
        messages = req.messages.len(),
        history_id = ?req.history_id,
        "stream chat request"
    );

    if let Some(id) = req.history_id.as_deref().filter(|id| !id.is_empty()) {
        ensure_not_foreign(&state, id, user).await?;
    }

    let chunks = state
        .upstream
        .open(&req.model, &req.messages, req.options)
        .await?;

    let span = info_span!("relay_session", user_id = user.id, model = %req.model);
    let session = SessionContext::new(user.id, req.model, req.messages, req.history_id);
    let (sink, body) = ChannelSink::new();
    let pipeline = RelayPipeline::new(
        EventInterceptor::new(HistoryPersister::new(Arc::clone(&state.store))),
        sink,
    );

    tokio::spawn(
        async move {
            let report = pipeline.run(ndjson_frames(chunks), session).await;
            info!(
                outcome = ?report.outcome,
                frames = report.frames_relayed,
                terminal_seen = report.terminal_seen,
                reply_len = report.reply.len(),
                "relay session finished"
            );
        }
        .instrument(span),
    );

    Ok((event_stream_headers(), Body::from_stream(body)).into_response())
}

/// A session may only continue a conversation the caller owns. An id that
/// does not exist is left to the persister, which then starts nothing and
/// relays the terminal event untouched.
async fn ensure_not_foreign(state: &AppState, id: &str, user: AuthUser) -> Result<(), ServerError> {
    match state.store.get_by_id(id).await {
        Ok(record) if record.user_id != user.id => Err(ServerError::Forbidden(
            "chat history belongs to another user".into(),
        )),
        Ok(_) | Err(StoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

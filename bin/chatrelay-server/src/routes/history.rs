use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chatrelay_core::{ConversationRecord, ConversationStore};
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::AuthUser;
use crate::schemas::history::{
    HistoryDetail, HistoryListResponse, HistorySummary, MessageResponse, SaveHistoryRequest,
    SaveHistoryResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(save_history, list_histories, get_history, delete_history),
    components(schemas(
        SaveHistoryRequest,
        SaveHistoryResponse,
        HistorySummary,
        HistoryListResponse,
        HistoryDetail,
        MessageResponse
    ))
)]
pub struct HistoryApi;

/// Register chat-history routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat-history", post(save_history))
        .route("/chat-histories", get(list_histories))
        .route(
            "/chat-history/{history_id}",
            get(get_history).delete(delete_history),
        )
}

#[utoipa::path(
    post,
    path = "/api/chat-history",
    tag = "history",
    request_body = SaveHistoryRequest,
    responses(
        (status = 200, description = "Conversation saved", body = SaveHistoryResponse),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = []))
)]
pub async fn save_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<SaveHistoryRequest>, JsonRejection>,
) -> Result<Json<SaveHistoryResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    if req.model.trim().is_empty() {
        return Err(ServerError::BadRequest("model must not be empty".into()));
    }

    let record = ConversationRecord::new(user.id, req.model, req.messages);
    let history_id = state.store.create(record).await?;
    info!(%history_id, user_id = user.id, "chat history saved");

    Ok(Json(SaveHistoryResponse {
        message: "chat history saved".into(),
        history_id,
    }))
}

#[utoipa::path(
    get,
    path = "/api/chat-histories",
    tag = "history",
    responses(
        (status = 200, description = "Caller's conversations, newest first", body = HistoryListResponse),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer" = []))
)]
pub async fn list_histories(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HistoryListResponse>, ServerError> {
    let records = state.store.list_by_user(user.id).await?;
    Ok(Json(HistoryListResponse {
        histories: records.iter().map(HistorySummary::from).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/chat-history/{history_id}",
    tag = "history",
    params(("history_id" = String, Path, description = "Conversation identifier")),
    responses(
        (status = 200, description = "Conversation detail", body = HistoryDetail),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer" = []))
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(history_id): Path<String>,
) -> Result<Json<HistoryDetail>, ServerError> {
    let record = owned_record(&state, &history_id, user).await?;
    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/api/chat-history/{history_id}",
    tag = "history",
    params(("history_id" = String, Path, description = "Conversation identifier")),
    responses(
        (status = 200, description = "Conversation deleted", body = MessageResponse),
        (status = 403, description = "Owned by another user"),
        (status = 404, description = "Not found"),
    ),
    security(("bearer" = []))
)]
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(history_id): Path<String>,
) -> Result<Json<MessageResponse>, ServerError> {
    owned_record(&state, &history_id, user).await?;
    state.store.delete(&history_id).await?;
    info!(%history_id, user_id = user.id, "chat history deleted");
    Ok(Json(MessageResponse {
        message: "chat history deleted".into(),
    }))
}

async fn owned_record(
    state: &AppState,
    history_id: &str,
    user: AuthUser,
) -> Result<ConversationRecord, ServerError> {
    let record = state.store.get_by_id(history_id).await?;
    if record.user_id != user.id {
        return Err(ServerError::Forbidden(
            "chat history belongs to another user".into(),
        ));
    }
    Ok(record)
}

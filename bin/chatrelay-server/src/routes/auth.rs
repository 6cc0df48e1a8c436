//! Account registration and login (`POST /api/register`, `POST /api/login`).
//!
//! Both answer with a fresh bearer token. Password hashing runs on the
//! blocking pool since bcrypt is deliberately slow.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use chatrelay_core::{NewUser, User, UserStore};
use tracing::{info, warn};
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::auth::issue;
use crate::schemas::auth::{AuthResponse, LoginRequest, RegisterRequest, UserProfile};
use crate::state::AppState;

const INVALID_CREDENTIALS: &str = "invalid username or password";

#[derive(OpenApi)]
#[openapi(
    paths(register, login),
    components(schemas(RegisterRequest, LoginRequest, UserProfile, AuthResponse))
)]
pub struct AuthApi;

/// Register the public account routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

#[utoipa::path(
    post,
    path = "/api/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input, or username or email already taken"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    let req = req.normalized();
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    if state.store.find_by_username(&req.username).await?.is_some() {
        return Err(ServerError::BadRequest("username already exists".into()));
    }
    if state.store.find_by_email(&req.email).await?.is_some() {
        return Err(ServerError::BadRequest("email already registered".into()));
    }

    let cost = state.config.bcrypt_cost;
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ServerError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))?;

    // A concurrent registration of the same name surfaces as a store conflict.
    let user = state
        .store
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "user registered");

    respond(&state, "registration successful", user)
}

#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unknown user or wrong password"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
    req.validate()
        .map_err(|e| ServerError::BadRequest(e.to_string()))?;

    let Some(user) = state.store.find_by_username(req.username.trim()).await? else {
        return Err(ServerError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    let hash = user.password_hash.clone();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ServerError::Internal(format!("password check task failed: {e}")))?
        .unwrap_or_else(|e| {
            warn!(user_id = user.id, error = %e, "stored password hash is unreadable");
            false
        });
    if !matches {
        return Err(ServerError::Unauthorized(INVALID_CREDENTIALS.into()));
    }
    info!(user_id = user.id, "user logged in");

    respond(&state, "login successful", user)
}

fn respond(state: &AppState, message: &str, user: User) -> Result<Json<AuthResponse>, ServerError> {
    let token = issue(user.id, &state.config.jwt_secret, state.config.token_ttl_secs)
        .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))?;
    Ok(Json(AuthResponse {
        message: message.to_owned(),
        user: user.into(),
        token,
    }))
}

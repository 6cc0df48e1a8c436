//! Bearer-token authentication for the `/api` routes that act on behalf of a
//! user.
//!
//! Tokens are HS256 JWTs carrying `{ "user_id": <int>, "exp": <unix secs> }`,
//! signed with `CHATRELAY_JWT_SECRET` by [`issue`] at login and registration.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub exp: u64,
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = match extract_bearer(req.headers().get(axum::http::header::AUTHORIZATION)) {
        Some(token) => token,
        None => {
            return ServerError::Unauthorized("missing bearer token".into()).into_response();
        }
    };

    match verify(token, &state.config.jwt_secret) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            debug!(error = %e, "rejecting bearer token");
            ServerError::Unauthorized("invalid or expired token".into()).into_response()
        }
    }
}

pub fn verify(token: &str, secret: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    let key = DecodingKey::from_secret(secret.as_bytes());
    let data = decode::<Claims>(token, &key, &validation)?;
    Ok(AuthUser {
        id: data.claims.user_id,
    })
}

fn extract_bearer(header: Option<&HeaderValue>) -> Option<&str> {
    let value = header?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Sign an HS256 token for `user_id` that expires `ttl_secs` from now.
pub fn issue(
    user_id: i64,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let exp = (chrono::Utc::now().timestamp() + ttl_secs).max(0) as u64;
    encode(
        &Header::new(Algorithm::HS256),
        &Claims { user_id, exp },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn valid_token_yields_user() {
        let token = issue(42, "s", 60).unwrap();
        assert_eq!(verify(&token, "s").unwrap(), AuthUser { id: 42 });
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue(42, "s", 60).unwrap();
        assert!(verify(&token, "other").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue(42, "s", -10).unwrap();
        assert!(verify(&token, "s").is_err());
    }

    #[test]
    fn bearer_prefix_is_required() {
        let v = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_bearer(Some(&v)), Some("abc"));
        let v = HeaderValue::from_static("Token abc");
        assert_eq!(extract_bearer(Some(&v)), None);
        let v = HeaderValue::from_static("Bearer ");
        assert_eq!(extract_bearer(Some(&v)), None);
        assert_eq!(extract_bearer(None), None);
    }
}

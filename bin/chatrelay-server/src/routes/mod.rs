//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional OpenAPI document (disable with `CHATRELAY_ENABLE_DOCS=false`)
//! - Health route
//! - `/api` routes; everything except registration, login and the model
//!   catalog requires a bearer token

mod auth;
mod chat;
pub mod doc;
mod health;
mod history;
mod models;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use tower::ServiceBuilder;

use crate::middleware::{self, cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let user_routes = Router::new()
        .merge(chat::router())
        .merge(history::router())
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_user,
        ));

    let api_router = Router::new()
        .merge(user_routes)
        .merge(auth::router())
        .merge(models::router());

    let mut app = Router::new()
        .merge(health::router())
        .nest("/api", api_router);

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(from_fn_with_state(state.clone(), trace::trace_middleware))
        .with_state(state)
}

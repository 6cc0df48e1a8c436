use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::state::AppState;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies at most this large are logged verbatim. Anything larger, or of
/// unknown length, is passed through without being read.
const MAX_LOGGED_BODY_BYTES: usize = 1024;

pub async fn trace_middleware(
    State(_state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("→ request started");

        let (parts, body) = req.into_parts();
        let body = log_json_body("request", &parts.headers, body).await;
        let mut req = Request::from_parts(parts, body);
        if let Some(v) = &trace_header {
            req.headers_mut().insert(X_TRACE_ID, v.clone());
        }

        let response = next.run(req).await;

        // Event streams must reach the client frame by frame, so only JSON
        // bodies are ever collected here.
        let (parts, body) = response.into_parts();
        let body = log_json_body("response", &parts.headers, body).await;
        let mut response = Response::from_parts(parts, body);
        if let Some(v) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, v);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );

        response
    }
    .instrument(span)
    .await
}

async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.contains("application/json") {
        return body;
    }

    match body.size_hint().upper() {
        Some(len) if len <= MAX_LOGGED_BODY_BYTES as u64 => {}
        Some(len) => {
            info!("{} body: [skipped: size={}]", direction, len);
            return body;
        }
        None => {
            info!("{} body: [skipped: size=unknown]", direction);
            return body;
        }
    }

    match to_bytes(body, MAX_LOGGED_BODY_BYTES).await {
        Ok(bytes) => {
            if let Ok(text) = std::str::from_utf8(&bytes) {
                info!("{} body: {}", direction, text);
            }
            Body::from(bytes)
        }
        Err(e) => {
            warn!(error = %e, "{} body could not be read", direction);
            Body::empty()
        }
    }
}

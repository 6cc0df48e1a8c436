//! The per-session pump: upstream frame → [`EventInterceptor`] → [`RelaySink`].
//!
//! One session is one sequential loop. Nothing is read from upstream until the
//! previous frame has been written and flushed, and the terminal frame is held
//! until persistence has had its chance to inject `history_id`.
//!
//! The loop stops when
//! * the upstream ends (normal completion, with or without a terminal event),
//! * the upstream fails mid-stream (an in-band error marker is sent), or
//! * a write or flush fails because the client went away.
//!
//! In the last two cases no further persistence is attempted, and dropping the
//! upstream stream cancels the backend request.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::UpstreamError;
use crate::interceptor::EventInterceptor;
use crate::relay::RelaySink;
use crate::session::SessionContext;
use crate::store::ConversationStore;

/// Why the pump stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpOutcome {
    /// The upstream stream ended on its own.
    Completed,
    /// The upstream failed after streaming had begun.
    UpstreamFailed,
    /// Writing to the client failed.
    ClientDisconnected,
}

/// What happened during one session; the session itself is gone by now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: PumpOutcome,
    /// Frames successfully written and flushed to the client.
    pub frames_relayed: usize,
    pub terminal_seen: bool,
    /// Final value of the session accumulator.
    pub reply: String,
}

/// In-band marker written after a mid-stream upstream failure. Headers are
/// already on the wire at that point, so this is the only way to tell the client.
pub fn error_marker(err: &UpstreamError) -> Bytes {
    let data = json!({ "error": format!("model request failed: {err}") });
    Bytes::from(format!("event: error\ndata: {data}\n\n"))
}

pub struct RelayPipeline<S, K> {
    interceptor: EventInterceptor<S>,
    sink: K,
}

impl<S, K> RelayPipeline<S, K>
where
    S: ConversationStore,
    K: RelaySink,
{
    pub fn new(interceptor: EventInterceptor<S>, sink: K) -> Self {
        Self { interceptor, sink }
    }

    /// Drive one session to the end.
    pub async fn run<St>(mut self, frames: St, mut session: SessionContext) -> SessionReport
    where
        St: Stream<Item = Result<Bytes, UpstreamError>> + Send,
    {
        let mut frames = std::pin::pin!(frames);
        let mut frames_relayed = 0usize;

        let outcome = loop {
            let frame = match frames.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    warn!(error = %e, frames_relayed, "upstream stream failed mid-session");
                    // Best effort; the client may already be gone too.
                    if self.sink.write(error_marker(&e)).await.is_ok() {
                        let _ = self.sink.flush().await;
                    }
                    break PumpOutcome::UpstreamFailed;
                }
                None => break PumpOutcome::Completed,
            };

            let out = self.interceptor.observe(frame, &mut session).await;

            if let Err(e) = self.sink.write(out).await {
                debug!(error = %e, frames_relayed, "write to client failed");
                break PumpOutcome::ClientDisconnected;
            }
            if let Err(e) = self.sink.flush().await {
                debug!(error = %e, frames_relayed, "flush to client failed");
                break PumpOutcome::ClientDisconnected;
            }
            frames_relayed += 1;
        };

        let terminal_seen = session.terminal_seen();
        match outcome {
            PumpOutcome::Completed if !terminal_seen => {
                warn!(frames_relayed, "upstream ended without a terminal event; nothing persisted");
            }
            PumpOutcome::ClientDisconnected => {
                info!(frames_relayed, terminal_seen, "client disconnected; upstream dropped");
            }
            _ => {}
        }

        SessionReport {
            outcome,
            frames_relayed,
            terminal_seen,
            reply: session.into_accumulated(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_marker_is_a_single_sse_event() {
        let marker = error_marker(&UpstreamError::Transport("reset".into()));
        let text = std::str::from_utf8(&marker).unwrap();
        assert!(text.starts_with("event: error\ndata: {"));
        assert!(text.ends_with("\n\n"));
        assert!(text.contains("reset"));
    }
}

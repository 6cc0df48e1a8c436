//! Observing stage of the relay.
//!
//! [`EventInterceptor::observe`] looks at each frame on its way to the client:
//! it accumulates `message.content`, watches for the one `done: true` event
//! and, on that event, runs the [`HistoryPersister`] before the frame is
//! released. Anything that is not a single JSON object is passed through
//! untouched.

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::persister::HistoryPersister;
use crate::session::SessionContext;
use crate::store::ConversationStore;

/// The fields of a stream event this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventView<'a> {
    pub content: Option<&'a str>,
    pub done: bool,
}

impl<'a> EventView<'a> {
    pub fn of(event: &'a Map<String, Value>) -> Self {
        Self {
            content: event
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str),
            done: event.get("done").and_then(Value::as_bool) == Some(true),
        }
    }
}

/// Parse a frame as exactly one JSON object.
pub fn parse_event(frame: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(frame) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub struct EventInterceptor<S> {
    persister: HistoryPersister<S>,
}

impl<S> Clone for EventInterceptor<S> {
    fn clone(&self) -> Self {
        Self {
            persister: self.persister.clone(),
        }
    }
}

impl<S: ConversationStore> EventInterceptor<S> {
    pub fn new(persister: HistoryPersister<S>) -> Self {
        Self { persister }
    }

    /// Inspect one frame and return the bytes that should be relayed.
    ///
    /// Only the terminal frame can come back different from what went in, and
    /// only when persistence succeeded.
    pub async fn observe(&self, frame: Bytes, session: &mut SessionContext) -> Bytes {
        if session.terminal_seen() {
            trace!(len = frame.len(), "frame after terminal event; forwarding unexamined");
            return frame;
        }

        let Some(event) = parse_event(&frame) else {
            trace!(len = frame.len(), "frame is not a single JSON object; forwarding as-is");
            return frame;
        };

        let view = EventView::of(&event);
        if let Some(content) = view.content {
            session.append(content);
        }
        if !view.done || !session.latch_terminal() {
            return frame;
        }

        debug!(
            reply_len = session.accumulated().len(),
            "terminal event received; persisting conversation"
        );
        let finalized = self.persister.finalize(session, event, &frame).await;
        finalized.rewritten.unwrap_or(frame)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use super::*;
    use crate::store::MemoryStore;
    use crate::types::ChatMessage;

    fn interceptor() -> (Arc<MemoryStore>, EventInterceptor<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let interceptor = EventInterceptor::new(HistoryPersister::new(Arc::clone(&store)));
        (store, interceptor)
    }

    #[test]
    fn view_reads_nested_content_and_done() {
        let event = parse_event(br#"{"message":{"role":"assistant","content":"x"},"done":false}"#)
            .unwrap();
        assert_eq!(
            EventView::of(&event),
            EventView {
                content: Some("x"),
                done: false
            }
        );
    }

    #[test]
    fn non_boolean_done_is_not_terminal() {
        let event = parse_event(br#"{"done":"true"}"#).unwrap();
        assert!(!EventView::of(&event).done);
    }

    #[test]
    fn arrays_and_scalars_are_not_events() {
        assert!(parse_event(b"[1,2]").is_none());
        assert!(parse_event(b"42").is_none());
        assert!(parse_event(b"{\"a\":1}{\"b\":2}").is_none());
    }

    #[tokio::test]
    async fn unparseable_frame_is_untouched_and_not_accumulated() {
        let (_, interceptor) = interceptor();
        let mut session = SessionContext::new(1, "m", vec![], None);
        let frame = Bytes::from_static(b"data: {\"message\":{\"content\":\"x\"}}\n");
        let out = interceptor.observe(frame.clone(), &mut session).await;
        assert_eq!(out, frame);
        assert_eq!(session.accumulated(), "");
    }

    #[tokio::test]
    async fn frames_after_terminal_are_not_examined() {
        let (store, interceptor) = interceptor();
        let mut session = SessionContext::new(1, "m", vec![ChatMessage::user("q")], None);

        interceptor
            .observe(Bytes::from_static(b"{\"done\":true}\n"), &mut session)
            .await;
        let late = Bytes::from_static(b"{\"message\":{\"content\":\"late\"},\"done\":true}\n");
        let out = interceptor.observe(late.clone(), &mut session).await;

        assert_eq!(out, late);
        assert_eq!(session.accumulated(), "");
        assert_eq!(store.len().await, 1);
    }
}

use crate::types::ChatMessage;

/// State of one in-flight streaming session.
///
/// Created per request, owned by the pipeline for the lifetime of the stream
/// and dropped when the pump ends. Never shared between sessions.
#[derive(Debug)]
pub struct SessionContext {
    pub user_id: i64,
    pub model_name: String,
    /// The caller's prompt, forwarded upstream and persisted verbatim.
    pub prompt: Vec<ChatMessage>,
    /// Conversation to overwrite on completion; `None` starts a new one.
    pub history_id: Option<String>,
    accumulator: String,
    terminal_seen: bool,
}

impl SessionContext {
    pub fn new(
        user_id: i64,
        model_name: impl Into<String>,
        prompt: Vec<ChatMessage>,
        history_id: Option<String>,
    ) -> Self {
        Self {
            user_id,
            model_name: model_name.into(),
            prompt,
            // An empty id means "new conversation", same as absent.
            history_id: history_id.filter(|id| !id.is_empty()),
            accumulator: String::new(),
            terminal_seen: false,
        }
    }

    /// Append one piece of assistant content, in arrival order.
    pub fn append(&mut self, content: &str) {
        self.accumulator.push_str(content);
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    pub fn terminal_seen(&self) -> bool {
        self.terminal_seen
    }

    /// Trip the terminal latch. Returns `true` only the first time.
    pub(crate) fn latch_terminal(&mut self) -> bool {
        !std::mem::replace(&mut self.terminal_seen, true)
    }

    /// Consume the session, yielding the full assistant reply.
    pub fn into_accumulated(self) -> String {
        self.accumulator
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn latch_fires_once() {
        let mut s = SessionContext::new(1, "m", vec![], None);
        assert!(s.latch_terminal());
        assert!(!s.latch_terminal());
        assert!(s.terminal_seen());
    }

    // Resolves only when exactly one impl applies, i.e. when the type is not `Clone`.
    trait NotClone<A> {
        fn check() {}
    }
    impl<T: ?Sized> NotClone<()> for T {}
    impl<T: ?Sized + Clone> NotClone<u8> for T {}

    #[test]
    fn session_cannot_be_duplicated() {
        <SessionContext as NotClone<_>>::check();
    }

    #[test]
    fn empty_history_id_means_new_session() {
        let s = SessionContext::new(1, "m", vec![], Some(String::new()));
        assert!(s.history_id.is_none());
    }

    #[test]
    fn accumulator_appends_in_order() {
        let mut s = SessionContext::new(1, "m", vec![], None);
        s.append("He");
        s.append("");
        s.append("llo");
        assert_eq!(s.accumulated(), "Hello");
    }
}

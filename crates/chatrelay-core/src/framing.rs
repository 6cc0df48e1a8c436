//! Re-segmentation of the upstream byte stream into whole NDJSON records.
//!
//! Transport chunk boundaries are not guaranteed to line up with event
//! boundaries. [`FrameAssembler`] buffers bytes and releases a frame when
//!
//! * a newline is seen: everything up to and including it is one frame, or
//! * the buffered tail, although unterminated, already parses as one complete
//!   JSON object.
//!
//! When the upstream sends exactly one terminated event per chunk the output
//! chunks are byte-for-byte the input chunks. Concatenating all frames always
//! yields the concatenated input, so the relay stays transparent either way.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::error::UpstreamError;

/// Incremental NDJSON framer.
///
/// Every byte is inspected once: `scanned` marks how far into `buf` the
/// lexer has already looked, so feeding a large record in small pieces stays
/// linear in its size.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buf: BytesMut,
    scanned: usize,
    lexer: Lexer,
}

/// Structural state of the unterminated record at the head of the buffer.
#[derive(Debug, Default)]
struct Lexer {
    first: Option<u8>,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// Offset of the byte that brought the nesting back to zero, while only
    /// whitespace has followed it.
    closed_at: Option<usize>,
    /// The record can no longer be released before its newline.
    settled: bool,
}

impl Lexer {
    fn feed(&mut self, pos: usize, b: u8) {
        if self.settled {
            return;
        }
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return;
        }
        if b.is_ascii_whitespace() {
            return;
        }
        if self.first.is_none() {
            self.first = Some(b);
        }
        self.closed_at = None;
        match b {
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' => match self.depth.checked_sub(1) {
                Some(0) => {
                    self.depth = 0;
                    self.closed_at = Some(pos);
                }
                Some(depth) => self.depth = depth,
                None => self.settled = true,
            },
            _ => {}
        }
    }

    // Only objects are considered: a bare scalar such as `12` could still be
    // the prefix of a longer token.
    fn may_be_complete(&self) -> bool {
        !self.settled && self.first == Some(b'{') && self.closed_at.is_some()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw upstream bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Option<Bytes> {
        while self.scanned < self.buf.len() {
            let pos = self.scanned;
            let b = self.buf[pos];
            self.scanned += 1;
            if b == b'\n' {
                return Some(self.take(pos + 1));
            }
            self.lexer.feed(pos, b);
        }

        if self.lexer.may_be_complete() {
            if serde_json::from_slice::<serde::de::IgnoredAny>(&self.buf).is_ok() {
                return Some(self.take(self.buf.len()));
            }
            // More bytes cannot turn a rejected prefix into a single value.
            self.lexer.settled = true;
        }
        None
    }

    /// Whatever is left once the upstream has ended. An incomplete trailing
    /// record is still relayed as-is.
    pub fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.take(self.buf.len()))
        }
    }

    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    fn take(&mut self, len: usize) -> Bytes {
        self.scanned = 0;
        self.lexer = Lexer::default();
        self.buf.split_to(len).freeze()
    }
}

struct FrameState<S> {
    inner: S,
    assembler: FrameAssembler,
    ended: bool,
}

/// Wrap an upstream chunk stream so that each yielded item is one frame.
///
/// A transport error is passed through immediately and ends the stream; any
/// partial record still buffered at that point is dropped.
pub fn ndjson_frames<S>(inner: S) -> impl Stream<Item = Result<Bytes, UpstreamError>> + Send
where
    S: Stream<Item = Result<Bytes, UpstreamError>> + Send + Unpin,
{
    let state = FrameState {
        inner,
        assembler: FrameAssembler::new(),
        ended: false,
    };
    stream::unfold(state, |mut st| async move {
        loop {
            if st.ended {
                return None;
            }
            if let Some(frame) = st.assembler.next_frame() {
                return Some((Ok(frame), st));
            }
            match st.inner.next().await {
                Some(Ok(chunk)) => st.assembler.push(&chunk),
                Some(Err(e)) => {
                    if st.assembler.buffered() > 0 {
                        tracing::debug!(
                            dropped = st.assembler.buffered(),
                            "discarding partial frame after upstream failure"
                        );
                    }
                    st.ended = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.ended = true;
                    return st.assembler.finish().map(|rest| (Ok(rest), st));
                }
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn chunks(parts: &[&str]) -> Vec<Result<Bytes, UpstreamError>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::copy_from_slice(p.as_bytes())))
            .collect()
    }

    async fn frames_of(parts: &[&str]) -> Vec<String> {
        ndjson_frames(stream::iter(chunks(parts)))
            .map(|r| String::from_utf8(r.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn aligned_chunks_pass_through_unchanged() {
        let input = ["{\"a\":1}\n", "{\"b\":2}\n", "{\"done\":true}\n"];
        assert_eq!(frames_of(&input).await, input);
    }

    #[tokio::test]
    async fn split_event_is_reassembled() {
        let frames = frames_of(&["{\"message\":{\"con", "tent\":\"Hi\"}}\n"]).await;
        assert_eq!(frames, vec!["{\"message\":{\"content\":\"Hi\"}}\n"]);
    }

    #[tokio::test]
    async fn coalesced_events_are_split() {
        let frames = frames_of(&["{\"a\":1}\n{\"b\":2}\n"]).await;
        assert_eq!(frames, vec!["{\"a\":1}\n", "{\"b\":2}\n"]);
    }

    #[tokio::test]
    async fn unterminated_complete_object_is_released_without_waiting() {
        let frames = frames_of(&["{\"a\":1}", "{\"b\":2}"]).await;
        assert_eq!(frames, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn trailing_garbage_is_flushed_at_end() {
        let frames = frames_of(&["{\"a\":1}\n", "{\"trunc"]).await;
        assert_eq!(frames, vec!["{\"a\":1}\n", "{\"trunc"]);
    }

    #[test]
    fn large_event_in_small_pieces_is_scanned_once() {
        let content = "x".repeat(256 * 1024);
        let event = format!("{{\"message\":{{\"content\":\"{content}\"}},\"done\":false}}\n");
        let mut assembler = FrameAssembler::new();
        let mut frames = Vec::new();
        for piece in event.as_bytes().chunks(16) {
            assembler.push(piece);
            while let Some(frame) = assembler.next_frame() {
                frames.push(frame);
            }
            assert_eq!(assembler.scanned, assembler.buffered());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_ref(), event.as_bytes());
        assert_eq!(assembler.finish(), None);
    }

    #[test]
    fn braces_inside_strings_do_not_close_the_record() {
        let mut assembler = FrameAssembler::new();
        assembler.push(br#"{"content":"} \" }"#);
        assert_eq!(assembler.next_frame(), None);
        assembler.push(br#"","done":true}"#);
        assert_eq!(
            assembler.next_frame().as_deref(),
            Some(br#"{"content":"} \" }","done":true}"#.as_slice())
        );
    }

    #[test]
    fn rejected_object_waits_for_its_newline() {
        let mut assembler = FrameAssembler::new();
        assembler.push(b"{oops}");
        assert_eq!(assembler.next_frame(), None);
        assembler.push(b" {\"a\":1}");
        assert_eq!(assembler.next_frame(), None);
        assembler.push(b"\n{\"b\":2}");
        assert_eq!(
            assembler.next_frame().as_deref(),
            Some(b"{oops} {\"a\":1}\n".as_slice())
        );
        assert_eq!(
            assembler.next_frame().as_deref(),
            Some(b"{\"b\":2}".as_slice())
        );
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let items = vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"par")),
            Err(UpstreamError::Transport("reset".into())),
            Ok(Bytes::from_static(b"tial\":1}\n")),
        ];
        let out: Vec<_> = ndjson_frames(stream::iter(items)).collect().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].as_ref().unwrap().as_ref(), b"{\"a\":1}\n");
        assert!(matches!(out[1], Err(UpstreamError::Transport(_))));
    }
}

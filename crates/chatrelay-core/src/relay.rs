//! Downstream side of the relay: the pass-through sink that writes chunks to
//! the calling client.
//!
//! [`RelaySink`] is deliberately dumb. It knows nothing about events or
//! persistence; [`crate::interceptor::EventInterceptor`] does the looking and
//! [`crate::pipeline::RelayPipeline`] composes the two.

use std::future::Future;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderName, HeaderValue};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::RelayError;

/// Write side of a client connection.
pub trait RelaySink: Send {
    /// Hand one chunk to the transport. Returns the number of bytes accepted.
    fn write(&mut self, chunk: Bytes) -> impl Future<Output = Result<usize, RelayError>> + Send;

    /// Wait until everything written so far has left the sink.
    fn flush(&mut self) -> impl Future<Output = Result<(), RelayError>> + Send;
}

/// Headers for an unbuffered, uncached, long-lived push response.
pub fn event_stream_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    // Stops nginx-style reverse proxies from buffering the stream.
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    headers
}

/// Body stream handed to the HTTP layer; pair of a [`ChannelSink`].
pub type ChannelBody = ReceiverStream<Result<Bytes, std::io::Error>>;

/// [`RelaySink`] over a single-slot channel whose receiver is the response body.
///
/// With one slot, `flush` returning means the HTTP layer has pulled the last
/// chunk out of the channel. When the client goes away the body (and with it
/// the receiver) is dropped, and the next write or flush fails.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
}

impl ChannelSink {
    pub fn new() -> (Self, ChannelBody) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, ReceiverStream::new(rx))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl RelaySink for ChannelSink {
    async fn write(&mut self, chunk: Bytes) -> Result<usize, RelayError> {
        let len = chunk.len();
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| RelayError::Disconnected)?;
        Ok(len)
    }

    async fn flush(&mut self) -> Result<(), RelayError> {
        // Reserving the only slot waits for the previous chunk to be taken.
        self.tx
            .reserve()
            .await
            .map(drop)
            .map_err(|_| RelayError::Disconnected)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn headers_disable_buffering_and_caching() {
        let headers = event_stream_headers();
        assert_eq!(headers[CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn flush_waits_for_reader() {
        let (mut sink, mut body) = ChannelSink::new();
        assert_eq!(sink.write(Bytes::from_static(b"abc")).await.unwrap(), 3);

        let reader = tokio::spawn(async move { body.next().await });
        sink.flush().await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn dropped_body_fails_writes() {
        let (mut sink, body) = ChannelSink::new();
        drop(body);
        assert!(sink.is_closed());
        assert!(matches!(
            sink.write(Bytes::from_static(b"x")).await,
            Err(RelayError::Disconnected)
        ));
        assert!(sink.flush().await.is_err());
    }
}

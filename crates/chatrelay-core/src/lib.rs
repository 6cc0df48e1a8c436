//! chatrelay-core – streaming chat relay with transparent history persistence.
//!
//! A session flows through these pieces, in order:
//!
//! 1. [`upstream::UpstreamClient`] opens the backend chat stream.
//! 2. [`framing::ndjson_frames`] re-segments it into whole NDJSON records.
//! 3. [`interceptor::EventInterceptor`] accumulates assistant content and, on
//!    the terminal event, runs [`persister::HistoryPersister`].
//! 4. [`relay::RelaySink`] writes each (possibly rewritten) frame to the
//!    client and flushes it.
//!
//! [`pipeline::RelayPipeline`] is the loop that ties them together.

pub mod error;
pub mod framing;
pub mod interceptor;
pub mod persister;
pub mod pipeline;
pub mod relay;
pub mod session;
pub mod store;
pub mod types;
pub mod upstream;

pub use error::{RelayError, StoreError, UpstreamError};
pub use interceptor::EventInterceptor;
pub use persister::{Finalized, HistoryPersister};
pub use pipeline::{PumpOutcome, RelayPipeline, SessionReport};
pub use relay::{ChannelSink, RelaySink};
pub use session::SessionContext;
pub use store::{ConversationStore, MemoryStore, NewUser, SqliteStore, User, UserStore};
pub use types::{ChatMessage, ConversationRecord, Role};
pub use upstream::{ChunkStream, UpstreamClient, UpstreamConfig};

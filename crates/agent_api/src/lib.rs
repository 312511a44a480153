//! Transport-only client primitives for agent conversation endpoints.
//!
//! This crate owns request building, history envelope parsing, and the
//! incremental `event:`/`data:` frame decoder for agent message streams. It
//! intentionally contains no conversation state: optimistic updates, the
//! tool-call ledger, and pagination bookkeeping live in the `agent_chat`
//! crate on top of this one.
//!
//! A stream obtained from [`AgentApiClient::send_message`] is one-shot: it
//! reflects a single connection and is never restartable. Callers feed its
//! chunks through a [`FrameDecoder`] and must treat a stream that ends
//! without a `complete` or `error` event as an abnormal termination.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod message;
pub mod sse;
pub mod url;

pub use client::{await_or_cancel, is_cancelled, AgentApiClient, ByteStream, CancellationSignal};
pub use config::AgentApiConfig;
pub use error::AgentApiError;
pub use events::StreamEvent;
pub use history::{HistoryCursor, HistoryPage, HistoryQuery};
pub use message::{Message, Role, ToolCallDescriptor};
pub use sse::FrameDecoder;
pub use url::{conversation_messages_url, normalize_base_url};

//! Streaming conversation client for agent tool platforms.
//!
//! The crate reconciles three views of one conversation: optimistic local
//! state (the just-sent user message, in-flight streaming text, in-flight
//! tool calls), the live event stream decoded by [`agent_api`], and the
//! authoritative persisted message list re-fetched when a stream settles.
//!
//! Invariant: at most one send/stream cycle is active per [`Conversation`]
//! at a time, and the held message list is mutated only by settling
//! (replace) and backward pagination (prepend).
//!
//! State is explicit and per-conversation: construct a [`Conversation`] per
//! conversation id and drop it at view teardown. No module-level singletons.

pub mod conversation;
pub mod error;
pub mod ledger;
pub mod pager;
pub mod session;
pub mod transport;

pub use conversation::{Conversation, CyclePhase, SendOutcome};
pub use error::ChatError;
pub use ledger::{classify_tool_output, ToolCall, ToolCallLedger, ToolCallStatus, ToolOutcome};
pub use pager::HistoryPager;
pub use session::{
    generate_conversation_id, resolve_conversation_id, ConversationRefStore,
    FsConversationRefStore, MemoryConversationRefStore,
};
pub use transport::ChatTransport;

pub use agent_api::{
    AgentApiClient, AgentApiConfig, AgentApiError, HistoryCursor, HistoryPage, HistoryQuery,
    Message, Role, ToolCallDescriptor,
};

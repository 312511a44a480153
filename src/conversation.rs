use std::collections::HashMap;

use agent_api::{
    await_or_cancel, is_cancelled, CancellationSignal, FrameDecoder, HistoryQuery, Message,
    StreamEvent,
};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::ledger::ToolCallLedger;
use crate::pager::HistoryPager;
use crate::transport::ChatTransport;

/// Phase of the send/stream/settle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Sending,
    Streaming,
    Settling,
}

/// Result of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The cycle ran to completion and the held list is settled.
    Sent,
    /// The submission was rejected: empty text or a cycle already in flight.
    /// Rejected submissions are never queued.
    Ignored,
}

/// Per-conversation state machine reconciling optimistic local state with
/// persisted history.
///
/// One instance per conversation id, constructed by the owning view and
/// dropped at teardown; nothing here is shared across conversations. At most
/// one send/stream cycle is active at a time, and the held message list is
/// mutated only by settling (replace) and [`Conversation::load_older`]
/// (prepend).
#[derive(Debug)]
pub struct Conversation {
    conversation_id: String,
    page_size: u32,
    phase: CyclePhase,
    messages: Vec<Message>,
    streaming_text: String,
    ledger: ToolCallLedger,
    pager: HistoryPager,
    next_local_id: u64,
}

impl Conversation {
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, page_size: u32) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            page_size,
            phase: CyclePhase::Idle,
            messages: Vec::new(),
            streaming_text: String::new(),
            ledger: ToolCallLedger::default(),
            pager: HistoryPager::new(page_size),
            next_local_id: 1,
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// The held message list: the single source of truth for rendering.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// In-flight assistant text for the active cycle.
    #[must_use]
    pub fn streaming_text(&self) -> &str {
        &self.streaming_text
    }

    /// Tool calls surfaced by the active cycle.
    #[must_use]
    pub fn ledger(&self) -> &ToolCallLedger {
        &self.ledger
    }

    #[must_use]
    pub fn pager(&self) -> &HistoryPager {
        &self.pager
    }

    /// Steady-state hydration: fetch the newest page and replace held state.
    pub async fn hydrate(&mut self, transport: &dyn ChatTransport) -> Result<(), ChatError> {
        if self.phase != CyclePhase::Idle {
            return Ok(());
        }

        let page = transport
            .fetch_history(&self.conversation_id, &HistoryQuery::initial(self.page_size))
            .await?;
        debug!(
            conversation_id = %self.conversation_id,
            messages = page.messages.len(),
            "hydrated from persisted history"
        );
        self.messages = page.messages;
        self.pager.reset(page.has_more);
        Ok(())
    }

    /// Run one send/stream/settle cycle for a user submission.
    ///
    /// An empty submission, or one arriving while a cycle is in flight, is
    /// rejected as [`SendOutcome::Ignored`]. Any fatal error rolls back the
    /// optimistic user message, clears the streaming accumulator and ledger,
    /// and returns the machine to idle; the caller must resubmit explicitly.
    /// Abandonment via `cancellation` takes the same error path with
    /// [`agent_api::AgentApiError::Cancelled`] as the reason.
    pub async fn send(
        &mut self,
        transport: &dyn ChatTransport,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<SendOutcome, ChatError> {
        if self.phase != CyclePhase::Idle {
            debug!(phase = ?self.phase, "submission rejected while cycle in flight");
            return Ok(SendOutcome::Ignored);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }

        self.phase = CyclePhase::Sending;
        self.streaming_text.clear();
        self.ledger.clear();

        let temp_id = format!("local-{}", self.next_local_id);
        self.next_local_id += 1;
        let created_at = match crate::session::now_rfc3339() {
            Ok(now) => now,
            Err(error) => {
                self.phase = CyclePhase::Idle;
                return Err(error);
            }
        };
        self.messages.push(Message::user(temp_id.clone(), text, created_at));

        match self.run_cycle(transport, text, cancellation).await {
            Ok(()) => {
                self.phase = CyclePhase::Idle;
                Ok(SendOutcome::Sent)
            }
            Err(error) => {
                warn!(
                    conversation_id = %self.conversation_id,
                    %error,
                    "cycle failed; rolling back optimistic state"
                );
                self.messages.retain(|message| message.id != temp_id);
                self.streaming_text.clear();
                self.ledger.clear();
                self.phase = CyclePhase::Idle;
                Err(error)
            }
        }
    }

    async fn run_cycle(
        &mut self,
        transport: &dyn ChatTransport,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<(), ChatError> {
        let mut stream = transport
            .open_message_stream(&self.conversation_id, text, cancellation)
            .await?;
        self.phase = CyclePhase::Streaming;

        let mut decoder = FrameDecoder::default();
        loop {
            if is_cancelled(cancellation) {
                return Err(agent_api::AgentApiError::Cancelled.into());
            }
            let Some(chunk) = await_or_cancel(stream.next(), cancellation).await? else {
                break;
            };
            let chunk = chunk?;

            // Events are processed strictly in arrival order: chunk order
            // determines final text, and a result must find its call already
            // ledgered.
            for event in decoder.feed(&chunk)? {
                match event {
                    StreamEvent::Chunk { text } => self.streaming_text.push_str(&text),
                    StreamEvent::ToolCall {
                        tool_call_id,
                        tool_name,
                        input,
                    } => self.ledger.record_call(tool_call_id, tool_name, input),
                    StreamEvent::ToolResult {
                        tool_call_id,
                        output,
                    } => self.ledger.record_result(&tool_call_id, output)?,
                    StreamEvent::Complete => {
                        drop(stream);
                        return self.settle(transport).await;
                    }
                    StreamEvent::Error { message } => return Err(ChatError::Stream(message)),
                }
            }
        }

        // The connection closed without a terminal event.
        decoder.finish()?;
        Err(agent_api::AgentApiError::StreamEndedEarly.into())
    }

    /// Replace held state with the authoritative persisted view.
    async fn settle(&mut self, transport: &dyn ChatTransport) -> Result<(), ChatError> {
        self.phase = CyclePhase::Settling;

        let page = transport
            .fetch_history(&self.conversation_id, &HistoryQuery::initial(self.page_size))
            .await?;
        debug!(
            conversation_id = %self.conversation_id,
            messages = page.messages.len(),
            has_more = page.has_more,
            "settled against persisted history"
        );

        self.messages = page.messages;
        self.streaming_text.clear();
        self.ledger.clear();
        self.pager.reset(page.has_more);
        Ok(())
    }

    /// Extend held history backward from the oldest held message.
    ///
    /// Rejected while a cycle is in flight; the pager itself additionally
    /// guards against re-entrant loads and exhausted history.
    pub async fn load_older(&mut self, transport: &dyn ChatTransport) -> Result<usize, ChatError> {
        if self.phase != CyclePhase::Idle {
            return Ok(0);
        }
        self.pager
            .load_older(transport, &self.conversation_id, &mut self.messages)
            .await
    }

    /// Persisted tool outputs keyed by call id.
    ///
    /// Rendering pairs an assistant message's embedded tool calls with their
    /// outputs through this map, never by storage position.
    #[must_use]
    pub fn tool_results_by_call_id(&self) -> HashMap<&str, &Message> {
        self.messages
            .iter()
            .filter_map(|message| {
                message
                    .tool_call_id
                    .as_deref()
                    .filter(|_| message.role == agent_api::Role::Tool)
                    .map(|call_id| (call_id, message))
            })
            .collect()
    }

    /// Persisted output payload for one call id, when present.
    #[must_use]
    pub fn paired_tool_output(&self, call_id: &str) -> Option<&Value> {
        self.messages
            .iter()
            .find(|message| message.is_tool_result_for(call_id))
            .and_then(|message| message.tool_result.as_ref())
    }
}

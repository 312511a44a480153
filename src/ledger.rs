use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ChatError;

/// Lifecycle state of one tool invocation.
///
/// The stream never emits an explicit per-call error status; failure is
/// detected from the output payload via [`classify_tool_output`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// An in-flight or completed tool invocation surfaced during streaming.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub tool_name: String,
    pub input: Value,
    pub output: Option<Value>,
    pub status: ToolCallStatus,
    /// Entries start expanded so in-flight work is visible by default.
    pub expanded: bool,
}

impl ToolCall {
    /// Application-level outcome derived from the resolved output payload.
    ///
    /// `None` while the call is still running.
    #[must_use]
    pub fn outcome(&self) -> Option<ToolOutcome> {
        self.output.as_ref().map(classify_tool_output)
    }
}

/// Application-level classification of a tool output payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Ok,
    Failed(String),
}

/// Duck-typed failure detection over a tool output payload.
///
/// Backends signal failure by convention rather than protocol status: an
/// explicit non-null `error` field, a `success: false` flag, or a `message`
/// string that reads as an error. Anything else counts as success.
#[must_use]
pub fn classify_tool_output(output: &Value) -> ToolOutcome {
    let Some(object) = output.as_object() else {
        return ToolOutcome::Ok;
    };

    if let Some(error) = object.get("error").filter(|value| !value.is_null()) {
        let reason = error
            .as_str()
            .map(ToString::to_string)
            .unwrap_or_else(|| error.to_string());
        return ToolOutcome::Failed(reason);
    }

    if object.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("tool reported failure")
            .to_string();
        return ToolOutcome::Failed(reason);
    }

    if let Some(message) = object.get("message").and_then(Value::as_str) {
        if message.trim().to_ascii_lowercase().starts_with("error") {
            return ToolOutcome::Failed(message.to_string());
        }
    }

    ToolOutcome::Ok
}

/// Insertion-ordered record of tool invocations for one stream cycle.
///
/// Mutated only by decoder output; cleared wholesale when the owning stream
/// completes, after which persisted `tool` messages are authoritative.
#[derive(Debug, Default)]
pub struct ToolCallLedger {
    calls: Vec<ToolCall>,
    index_by_id: HashMap<String, usize>,
}

impl ToolCallLedger {
    /// Record a `tool_call` event. The entry goes straight to `Running`;
    /// no user-visible `Pending` window exists in this protocol.
    pub fn record_call(
        &mut self,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Value,
    ) {
        let call_id = call_id.into();
        let tool_name = tool_name.into();
        debug!(%call_id, %tool_name, "tool call started");

        let next_index = self.calls.len();
        self.index_by_id.insert(call_id.clone(), next_index);
        self.calls.push(ToolCall {
            call_id,
            tool_name,
            input,
            output: None,
            status: ToolCallStatus::Running,
            expanded: true,
        });
    }

    /// Record a `tool_result` event for a previously surfaced call.
    ///
    /// A result with no matching call is a protocol violation: results
    /// cannot precede their calls, and the ledger is left untouched.
    pub fn record_result(&mut self, call_id: &str, output: Value) -> Result<(), ChatError> {
        let Some(index) = self.index_by_id.get(call_id).copied() else {
            warn!(call_id, "tool result without a matching call");
            return Err(ChatError::ResultWithoutCall {
                call_id: call_id.to_string(),
            });
        };

        let call = &mut self.calls[index];
        call.output = Some(output);
        call.status = ToolCallStatus::Success;
        Ok(())
    }

    #[must_use]
    pub fn get(&self, call_id: &str) -> Option<&ToolCall> {
        self.index_by_id
            .get(call_id)
            .map(|index| &self.calls[*index])
    }

    /// Calls in the order they were surfaced by the stream.
    #[must_use]
    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
        self.index_by_id.clear();
    }
}

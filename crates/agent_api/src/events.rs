use serde::Deserialize;
use serde_json::Value;

/// Typed event decoded from one `data:` line of a message stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental assistant text.
    Chunk { text: String },
    /// A tool invocation surfaced mid-stream.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    /// The output for a previously surfaced tool invocation.
    ToolResult { tool_call_id: String, output: Value },
    /// Stream end marker; no further events follow.
    Complete,
    /// Terminal failure reported by the stream itself.
    Error { message: String },
}

impl StreamEvent {
    /// Returns true when this event terminates the stream.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChunkPayload {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolCallPayload {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolResultPayload {
    pub tool_call_id: String,
    #[serde(default)]
    pub output: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEventPayload {
    #[serde(default = "default_error_message")]
    pub message: String,
}

fn default_error_message() -> String {
    "agent stream reported an error".to_string()
}

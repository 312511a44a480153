use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Conversation turn role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// Tool invocation descriptor embedded in a persisted assistant message.
///
/// The matching output arrives as a separate `tool` message correlated by
/// `tool_call_id`; storage position guarantees no adjacency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallDescriptor {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub input: Value,
}

/// One persisted turn in a conversation.
///
/// Messages are totally ordered by `created_at`; ties break by arrival
/// order, which the wire list already reflects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDescriptor>,
    /// RFC 3339 creation timestamp; doubles as the backward-pagination cursor.
    pub created_at: String,
}

impl Message {
    #[must_use]
    pub fn user(id: impl Into<String>, content: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            tool_name: None,
            tool_call_id: None,
            tool_result: None,
            tool_calls: Vec::new(),
            created_at: created_at.into(),
        }
    }

    /// Parsed creation timestamp, when the wire value is valid RFC 3339.
    #[must_use]
    pub fn created_at_time(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.created_at, &Rfc3339).ok()
    }

    /// Returns true for a `tool` message carrying the output of `call_id`.
    #[must_use]
    pub fn is_tool_result_for(&self, call_id: &str) -> bool {
        self.role == Role::Tool && self.tool_call_id.as_deref() == Some(call_id)
    }
}

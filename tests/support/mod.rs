#![allow(dead_code)]

use agent_chat::{HistoryPage, Message, Role, ToolCallDescriptor};
use serde_json::Value;

pub fn user_message(id: &str, content: &str, created_at: &str) -> Message {
    Message::user(id, content, created_at)
}

pub fn assistant_message(id: &str, content: &str, created_at: &str) -> Message {
    Message {
        id: id.to_string(),
        role: Role::Assistant,
        content: content.to_string(),
        tool_name: None,
        tool_call_id: None,
        tool_result: None,
        tool_calls: Vec::new(),
        created_at: created_at.to_string(),
    }
}

pub fn assistant_with_tool_calls(
    id: &str,
    content: &str,
    calls: Vec<(&str, &str, Value)>,
    created_at: &str,
) -> Message {
    Message {
        tool_calls: calls
            .into_iter()
            .map(|(call_id, tool_name, input)| ToolCallDescriptor {
                tool_call_id: call_id.to_string(),
                tool_name: tool_name.to_string(),
                input,
            })
            .collect(),
        ..assistant_message(id, content, created_at)
    }
}

pub fn tool_message(
    id: &str,
    call_id: &str,
    tool_name: &str,
    output: Value,
    created_at: &str,
) -> Message {
    Message {
        id: id.to_string(),
        role: Role::Tool,
        content: String::new(),
        tool_name: Some(tool_name.to_string()),
        tool_call_id: Some(call_id.to_string()),
        tool_result: Some(output),
        tool_calls: Vec::new(),
        created_at: created_at.to_string(),
    }
}

pub fn page(messages: Vec<Message>, has_more: bool) -> HistoryPage {
    HistoryPage { messages, has_more }
}

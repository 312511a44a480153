/// Default base URL for a locally served platform API.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Normalize a base URL: trim whitespace and trailing slashes, fall back to
/// the default when empty.
#[must_use]
pub fn normalize_base_url(input: &str) -> String {
    let base = input.trim();
    let base = if base.is_empty() { DEFAULT_BASE_URL } else { base };
    base.trim_end_matches('/').to_string()
}

/// Per-agent, per-conversation messages resource.
///
/// `POST` sends a message and streams the reply; `GET` fetches history.
#[must_use]
pub fn conversation_messages_url(base_url: &str, agent_id: &str, conversation_id: &str) -> String {
    format!(
        "{}/api/agents/{}/conversations/{}/messages",
        normalize_base_url(base_url),
        agent_id.trim(),
        conversation_id.trim(),
    )
}

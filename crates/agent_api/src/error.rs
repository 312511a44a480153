use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentApiError {
    #[error("agent id is required")]
    MissingAgentId,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {0}: {1}")]
    Status(StatusCode, String),

    #[error("malformed stream frame: {0}")]
    MalformedFrame(String),

    #[error("stream ended unexpectedly before a complete or error event")]
    StreamEndedEarly,

    #[error("stream failed: {0}")]
    StreamFailed(String),

    #[error("malformed history response: {0}")]
    Envelope(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,
}

/// JSON error body shape returned by the platform API on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract a human-readable error message from a failed response body.
///
/// Falls back to the raw body, then to the status line, so the caller always
/// has something to surface.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(message) = parsed
            .error
            .or(parsed.message)
            .filter(|value| !value.trim().is_empty())
        {
            return message;
        }
    }

    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

use serde::Deserialize;

use crate::error::AgentApiError;
use crate::message::Message;

/// Cursor selecting which slice of history to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryCursor {
    /// Initial page: numeric offset from the newest messages.
    Offset(u32),
    /// Backward pagination: exclusive RFC 3339 upper bound.
    Before(String),
}

/// Query parameters for one history fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub cursor: HistoryCursor,
}

impl HistoryQuery {
    /// Initial page of the newest messages.
    #[must_use]
    pub fn initial(limit: u32) -> Self {
        Self {
            limit,
            cursor: HistoryCursor::Offset(0),
        }
    }

    /// Page of messages strictly older than `before`.
    #[must_use]
    pub fn before(limit: u32, before: impl Into<String>) -> Self {
        Self {
            limit,
            cursor: HistoryCursor::Before(before.into()),
        }
    }

    /// Query-string pairs in the platform API's expected names.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        match &self.cursor {
            HistoryCursor::Offset(offset) => pairs.push(("offset", offset.to_string())),
            HistoryCursor::Before(before) => pairs.push(("before", before.clone())),
        }
        pairs
    }
}

/// One fetched slice of conversation history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<EnvelopeData>,
    #[serde(default)]
    pagination: Option<EnvelopePagination>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData {
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopePagination {
    #[serde(default)]
    has_more: bool,
}

/// Parse a history response body into a page.
///
/// `{ success: false, error }` bodies map to [`AgentApiError::Envelope`].
pub fn parse_history_body(body: &str) -> Result<HistoryPage, AgentApiError> {
    let envelope: Envelope = serde_json::from_str(body)
        .map_err(|error| AgentApiError::Envelope(format!("invalid JSON envelope: {error}")))?;

    if !envelope.success {
        return Err(AgentApiError::Envelope(
            envelope
                .error
                .unwrap_or_else(|| "history fetch reported failure".to_string()),
        ));
    }

    Ok(HistoryPage {
        messages: envelope.data.map(|data| data.messages).unwrap_or_default(),
        has_more: envelope
            .pagination
            .map(|pagination| pagination.has_more)
            .unwrap_or(false),
    })
}

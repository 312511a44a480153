use std::path::PathBuf;

use agent_api::AgentApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Api(#[from] AgentApiError),

    #[error("tool result for unknown call id '{call_id}'")]
    ResultWithoutCall { call_id: String },

    #[error("agent stream failed: {0}")]
    Stream(String),

    #[error("failed to persist conversation reference at {path}: {source}")]
    RefStore {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to format current UTC timestamp as RFC 3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl ChatError {
    /// Returns true when this error resolved from a caller-initiated
    /// cancellation rather than a transport or protocol failure.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Api(AgentApiError::Cancelled))
    }
}

use std::future::Future;
use std::pin::Pin;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AgentApiConfig;
use crate::error::{parse_error_message, AgentApiError};
use crate::history::{parse_history_body, HistoryPage, HistoryQuery};
use crate::url::conversation_messages_url;

/// Optional cancellation signal shared between the caller and in-flight I/O.
pub type CancellationSignal = Arc<AtomicBool>;

/// Raw response body stream handed to the frame decoder.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, AgentApiError>> + Send>>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    message: &'a str,
}

/// HTTP client for one agent's conversation endpoints.
#[derive(Debug)]
pub struct AgentApiClient {
    http: Client,
    config: AgentApiConfig,
}

impl AgentApiClient {
    pub fn new(config: AgentApiConfig) -> Result<Self, AgentApiError> {
        if config.agent_id.trim().is_empty() {
            return Err(AgentApiError::MissingAgentId);
        }
        let http = Client::builder().build().map_err(AgentApiError::from)?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &AgentApiConfig {
        &self.config
    }

    #[must_use]
    pub fn messages_url(&self, conversation_id: &str) -> String {
        conversation_messages_url(&self.config.base_url, &self.config.agent_id, conversation_id)
    }

    fn build_headers(&self) -> Result<HeaderMap, AgentApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        if let Some(token) = self
            .config
            .bearer_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
        {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    AgentApiError::InvalidBaseUrl("bearer token is not a valid header".to_string())
                })?,
            );
        }

        for (key, value) in &self.config.extra_headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                AgentApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                AgentApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// Send one user message and open the reply stream.
    ///
    /// Non-2xx responses resolve to [`AgentApiError::Status`] with a message
    /// extracted from the JSON error body. No automatic retry: a failed or
    /// cancelled send is rolled back by the caller and resubmitted
    /// explicitly.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, AgentApiError> {
        let url = self.messages_url(conversation_id);
        debug!(%url, "opening message stream");

        let request = self
            .http
            .post(&url)
            .headers(self.build_headers()?)
            .json(&SendMessageBody { message: text })
            .send();
        let response = await_or_cancel(request, cancellation).await??;

        let status = response.status();
        if !status.is_success() {
            let body = await_or_cancel(response.text(), cancellation)
                .await?
                .unwrap_or_default();
            let message = parse_error_message(status, &body);
            warn!(%status, %message, "message send rejected");
            return Err(AgentApiError::Status(status, message));
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(AgentApiError::from)),
        ))
    }

    /// Fetch one page of conversation history.
    ///
    /// A 404 means the conversation has not been created yet and is treated
    /// as zero messages with no further history, not as an error.
    pub async fn fetch_history(
        &self,
        conversation_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, AgentApiError> {
        let url = self.messages_url(conversation_id);
        debug!(%url, ?query, "fetching history page");

        let mut request = self
            .http
            .get(&url)
            .headers(self.build_headers()?)
            .query(&query.query_pairs());
        if let Some(timeout) = self.config.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(conversation_id, "conversation not yet created; empty history");
            return Ok(HistoryPage::default());
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AgentApiError::Status(status, parse_error_message(status, &body)));
        }

        parse_history_body(&body)
    }
}

/// Returns true when the shared cancellation flag has been raised.
#[must_use]
pub fn is_cancelled(cancellation: Option<&CancellationSignal>) -> bool {
    cancellation.is_some_and(|signal| signal.load(Ordering::Acquire))
}

/// Await a future while polling the cancellation flag between intervals.
///
/// Cancellation drops the future, which releases the underlying connection.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, AgentApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(AgentApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(AgentApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}

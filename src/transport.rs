use agent_api::{
    AgentApiClient, AgentApiError, ByteStream, CancellationSignal, HistoryPage, HistoryQuery,
};
use async_trait::async_trait;

/// Seam between conversation state and the platform API.
///
/// The HTTP implementation is [`AgentApiClient`]; tests drive the same state
/// machine through [`mock::MockChatTransport`].
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one user message and open the raw reply byte stream.
    async fn open_message_stream(
        &self,
        conversation_id: &str,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, AgentApiError>;

    /// Fetch one page of persisted history.
    async fn fetch_history(
        &self,
        conversation_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, AgentApiError>;
}

#[async_trait]
impl ChatTransport for AgentApiClient {
    async fn open_message_stream(
        &self,
        conversation_id: &str,
        text: &str,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<ByteStream, AgentApiError> {
        self.send_message(conversation_id, text, cancellation).await
    }

    async fn fetch_history(
        &self,
        conversation_id: &str,
        query: &HistoryQuery,
    ) -> Result<HistoryPage, AgentApiError> {
        AgentApiClient::fetch_history(self, conversation_id, query).await
    }
}

pub mod mock {
    //! Deterministic in-memory transport for driving the conversation state
    //! machine without a network.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use agent_api::{
        AgentApiError, ByteStream, CancellationSignal, HistoryPage, HistoryQuery,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::Value;

    use super::ChatTransport;

    /// Render one `event:`/`data:` frame as wire text.
    #[must_use]
    pub fn frame(event: &str, data: &Value) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    enum QueuedStream {
        Chunks(Vec<Bytes>),
        OpenFailure(AgentApiError),
    }

    enum QueuedHistory {
        Page(HistoryPage),
        Failure(AgentApiError),
    }

    /// Scripted transport: streams and history pages are queued up front and
    /// consumed one per call, with every request recorded for assertions.
    #[derive(Default)]
    pub struct MockChatTransport {
        streams: Mutex<VecDeque<QueuedStream>>,
        history: Mutex<VecDeque<QueuedHistory>>,
        sent: Mutex<Vec<(String, String)>>,
        history_requests: Mutex<Vec<(String, HistoryQuery)>>,
    }

    impl MockChatTransport {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue one reply stream, delivered as the given byte chunks.
        pub fn push_stream<I, S>(&self, chunks: I)
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            let chunks = chunks
                .into_iter()
                .map(|chunk| Bytes::from(chunk.into()))
                .collect();
            self.streams
                .lock()
                .expect("mock stream queue poisoned")
                .push_back(QueuedStream::Chunks(chunks));
        }

        /// Queue a failure for the next stream open.
        pub fn push_stream_failure(&self, error: AgentApiError) {
            self.streams
                .lock()
                .expect("mock stream queue poisoned")
                .push_back(QueuedStream::OpenFailure(error));
        }

        /// Queue one history page.
        pub fn push_history(&self, page: HistoryPage) {
            self.history
                .lock()
                .expect("mock history queue poisoned")
                .push_back(QueuedHistory::Page(page));
        }

        /// Queue a failure for the next history fetch.
        pub fn push_history_failure(&self, error: AgentApiError) {
            self.history
                .lock()
                .expect("mock history queue poisoned")
                .push_back(QueuedHistory::Failure(error));
        }

        /// Messages sent so far, as `(conversation_id, text)` pairs.
        #[must_use]
        pub fn sent_messages(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("mock send log poisoned").clone()
        }

        /// History fetches so far, as `(conversation_id, query)` pairs.
        #[must_use]
        pub fn history_requests(&self) -> Vec<(String, HistoryQuery)> {
            self.history_requests
                .lock()
                .expect("mock history log poisoned")
                .clone()
        }
    }

    #[async_trait]
    impl ChatTransport for MockChatTransport {
        async fn open_message_stream(
            &self,
            conversation_id: &str,
            text: &str,
            _cancellation: Option<&CancellationSignal>,
        ) -> Result<ByteStream, AgentApiError> {
            self.sent
                .lock()
                .expect("mock send log poisoned")
                .push((conversation_id.to_string(), text.to_string()));

            let queued = self
                .streams
                .lock()
                .expect("mock stream queue poisoned")
                .pop_front();
            match queued {
                Some(QueuedStream::Chunks(chunks)) => {
                    let stream: ByteStream = Box::pin(stream::iter(
                        chunks.into_iter().map(Ok::<Bytes, AgentApiError>),
                    ));
                    Ok(stream)
                }
                Some(QueuedStream::OpenFailure(error)) => Err(error),
                None => Err(AgentApiError::StreamFailed(
                    "mock transport has no queued stream".to_string(),
                )),
            }
        }

        async fn fetch_history(
            &self,
            conversation_id: &str,
            query: &HistoryQuery,
        ) -> Result<HistoryPage, AgentApiError> {
            self.history_requests
                .lock()
                .expect("mock history log poisoned")
                .push((conversation_id.to_string(), query.clone()));

            let queued = self
                .history
                .lock()
                .expect("mock history queue poisoned")
                .pop_front();
            match queued {
                Some(QueuedHistory::Page(page)) => Ok(page),
                Some(QueuedHistory::Failure(error)) => Err(error),
                None => Ok(HistoryPage::default()),
            }
        }
    }
}

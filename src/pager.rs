use std::collections::HashSet;

use agent_api::{HistoryQuery, Message};
use tracing::debug;

use crate::error::ChatError;
use crate::transport::ChatTransport;

/// Large virtualization base so the start index can only move backward.
///
/// Prepending `n` items moves the index back by exactly `n`, keeping the
/// visible window of a virtualized list stable.
pub const START_INDEX_BASE: usize = 1_000_000;

/// Backward pagination over persisted history.
///
/// The cursor is always derived from the oldest held message, so it only
/// ever moves backward in time. `has_more = false` is terminal until the
/// next settle resets it, since only new content can change the answer.
#[derive(Debug)]
pub struct HistoryPager {
    page_size: u32,
    has_more: bool,
    loading: bool,
    start_index: usize,
}

impl HistoryPager {
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            has_more: false,
            loading: false,
            start_index: START_INDEX_BASE,
        }
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Current virtualization start index for the held list.
    #[must_use]
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Re-arm after a settle replaced the held list.
    pub fn reset(&mut self, has_more: bool) {
        self.has_more = has_more;
        self.loading = false;
        self.start_index = START_INDEX_BASE;
    }

    /// Load the page preceding the oldest held message and prepend it.
    ///
    /// No-ops (returning 0) while a load is in flight, when no more history
    /// exists, or when the held list is empty and no cursor can be derived.
    /// On failure the held list and `has_more` are left unchanged, so a
    /// retry is safe.
    pub async fn load_older(
        &mut self,
        transport: &dyn ChatTransport,
        conversation_id: &str,
        held: &mut Vec<Message>,
    ) -> Result<usize, ChatError> {
        if self.loading || !self.has_more {
            return Ok(0);
        }
        let Some(cursor) = held.first().map(|message| message.created_at.clone()) else {
            return Ok(0);
        };

        self.loading = true;
        let query = HistoryQuery::before(self.page_size, cursor);
        let result = transport.fetch_history(conversation_id, &query).await;
        self.loading = false;

        let page = result.map_err(ChatError::from)?;

        let held_ids: HashSet<&str> = held.iter().map(|message| message.id.as_str()).collect();
        let fresh: Vec<Message> = page
            .messages
            .into_iter()
            .filter(|message| !held_ids.contains(message.id.as_str()))
            .collect();
        let prepended = fresh.len();

        debug!(conversation_id, prepended, has_more = page.has_more, "older history loaded");

        held.splice(0..0, fresh);
        self.start_index = self.start_index.saturating_sub(prepended);
        self.has_more = page.has_more;

        Ok(prepended)
    }
}

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ChatError;

/// Resolve the conversation id for a view: an explicit persisted reference
/// wins, otherwise a fresh id is generated.
#[must_use]
pub fn resolve_conversation_id(explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => generate_conversation_id(),
    }
}

/// Generate a `conv-{epoch_ms}-{random}` identifier.
///
/// Collision-resistant for practical purposes only; never an authorization
/// token.
#[must_use]
pub fn generate_conversation_id() -> String {
    let epoch_ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    let id = format!("conv-{}-{}", epoch_ms, &suffix[..8]);
    debug!(%id, "generated conversation id");
    id
}

/// Persisted pointer from an agent to its most recent conversation, so a
/// reload resumes instead of starting over.
///
/// Saved on the first successful send of a conversation; `load` is
/// best-effort and falls back to a fresh id on any failure.
pub trait ConversationRefStore: Send + Sync {
    fn load(&self, agent_id: &str) -> Option<String>;
    fn save(&self, agent_id: &str, conversation_id: &str) -> Result<(), ChatError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRef {
    conversation_id: String,
}

/// File-backed reference store: one small JSON file per agent.
#[derive(Debug)]
pub struct FsConversationRefStore {
    root: PathBuf,
}

impl FsConversationRefStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ref_path(&self, agent_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_for_filename(agent_id)))
    }
}

impl ConversationRefStore for FsConversationRefStore {
    fn load(&self, agent_id: &str) -> Option<String> {
        let path = self.ref_path(agent_id);
        let body = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<ConversationRef>(&body) {
            Ok(reference) => Some(reference.conversation_id),
            Err(error) => {
                warn!(path = %path.display(), %error, "ignoring unreadable conversation reference");
                None
            }
        }
    }

    fn save(&self, agent_id: &str, conversation_id: &str) -> Result<(), ChatError> {
        let path = self.ref_path(agent_id);
        let io_error = |source| ChatError::RefStore {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let body = serde_json::to_string(&ConversationRef {
            conversation_id: conversation_id.to_string(),
        })
        .map_err(|source| ChatError::Api(source.into()))?;
        fs::write(&path, body).map_err(io_error)?;
        Ok(())
    }
}

/// In-memory reference store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryConversationRefStore {
    refs: Mutex<HashMap<String, String>>,
}

impl MemoryConversationRefStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConversationRefStore for MemoryConversationRefStore {
    fn load(&self, agent_id: &str) -> Option<String> {
        self.refs
            .lock()
            .ok()
            .and_then(|refs| refs.get(agent_id).cloned())
    }

    fn save(&self, agent_id: &str, conversation_id: &str) -> Result<(), ChatError> {
        if let Ok(mut refs) = self.refs.lock() {
            refs.insert(agent_id.to_string(), conversation_id.to_string());
        }
        Ok(())
    }
}

fn sanitize_for_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' => '-',
            _ => c,
        })
        .collect()
}

/// Current UTC time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> Result<String, ChatError> {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(ChatError::ClockFormat)
}

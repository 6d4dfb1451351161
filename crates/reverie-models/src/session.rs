use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Snapshot of one session's conversational state. Only `short_term` and
/// `compressed_context` go over the wire; the session id is the storage key
/// and `updated_at` is cache bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConversationState {
    #[serde(skip)]
    pub session_id: String,
    #[serde(default)]
    pub short_term: Vec<Message>,
    #[serde(default)]
    pub compressed_context: String,
    /// Milliseconds since the Unix epoch.
    #[serde(skip)]
    pub updated_at: i64,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Size of the encoded state in bytes: UTF-8 length of the compact JSON
    /// encoding. This is the unit all byte budgets are measured in.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }
}

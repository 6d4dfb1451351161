//! Typed session store with TTL, layered over the byte-level redb storage.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CoreError, Result};
use reverie_models::ConversationState;
use reverie_storage::{SessionStateStorage, time_utils};

/// Default session lifetime.
pub const DEFAULT_TTL_DAYS: i64 = 14;

/// Default hard cap on an encoded state.
pub const DEFAULT_MAX_STATE_BYTES: usize = 140_000;

const SECONDS_PER_DAY: i64 = 86_400;

/// On-disk envelope around the encoded state.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEnvelope {
    state_json: String,
    /// Epoch seconds of the last write.
    updated_at: i64,
    /// Epoch seconds after which the entry reads as absent.
    expires_at: i64,
}

/// Session store: JSON states in a TTL envelope over the byte-level backend.
///
/// Oversized writes are rejected outright; keeping states under the cap is
/// the sanitizer's job, so an oversized state reaching this layer is a bug
/// upstream.
pub struct SessionStore {
    storage: SessionStateStorage,
    ttl_days: i64,
    max_state_bytes: usize,
}

impl SessionStore {
    pub fn new(storage: SessionStateStorage, ttl_days: i64, max_state_bytes: usize) -> Self {
        Self {
            storage,
            ttl_days: ttl_days.max(1),
            max_state_bytes,
        }
    }

    /// Load one session. Expired or unreadable entries are deleted and read
    /// as absent.
    pub fn load(&self, session_id: &str) -> Result<Option<ConversationState>> {
        let Some(raw) = self.storage.get_raw(session_id)? else {
            return Ok(None);
        };

        let envelope: StoredEnvelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session = %session_id, error = %e, "dropping unreadable session envelope");
                self.storage.delete(session_id)?;
                return Ok(None);
            }
        };

        if time_utils::now_secs() >= envelope.expires_at {
            self.storage.delete(session_id)?;
            return Ok(None);
        }

        let mut state: ConversationState = match serde_json::from_str(&envelope.state_json) {
            Ok(state) => state,
            Err(e) => {
                warn!(session = %session_id, error = %e, "dropping unreadable session state");
                self.storage.delete(session_id)?;
                return Ok(None);
            }
        };
        state.session_id = session_id.to_string();
        state.updated_at = time_utils::now_ms();
        Ok(Some(state))
    }

    /// Save one session, refreshing its TTL.
    pub fn save(&self, state: &ConversationState) -> Result<()> {
        let state_json = serde_json::to_string(state)?;
        let size = state_json.len();
        if size > self.max_state_bytes {
            return Err(CoreError::StateTooLarge {
                size,
                max: self.max_state_bytes,
            });
        }

        let now = time_utils::now_secs();
        let envelope = StoredEnvelope {
            state_json,
            updated_at: now,
            expires_at: now + self.ttl_days * SECONDS_PER_DAY,
        };
        self.storage
            .put_raw(&state.session_id, &serde_json::to_vec(&envelope)?)?;
        Ok(())
    }

    /// Delete one session outright.
    pub fn delete(&self, session_id: &str) -> Result<bool> {
        Ok(self.storage.delete(session_id)?)
    }

    /// Delete every expired (or unreadable) envelope. Returns how many
    /// entries were removed.
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = time_utils::now_secs();
        let mut removed = 0;
        for (session_id, raw) in self.storage.list_raw()? {
            let expired = match serde_json::from_slice::<StoredEnvelope>(&raw) {
                Ok(envelope) => now >= envelope.expires_at,
                Err(_) => true,
            };
            if expired && self.storage.delete(&session_id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

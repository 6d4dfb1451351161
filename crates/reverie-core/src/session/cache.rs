//! In-memory session cache with least-recently-updated eviction.

use std::collections::HashMap;

use tracing::debug;

use reverie_models::ConversationState;

/// Default cap on cached sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 64;

/// Bounded map of session id to conversation state. When the cap is
/// exceeded, the state with the oldest `updated_at` goes first.
#[derive(Debug, Default)]
pub struct SessionCache {
    states: HashMap<String, ConversationState>,
    max_sessions: usize,
}

impl SessionCache {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            states: HashMap::new(),
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn get(&self, session_id: &str) -> Option<&ConversationState> {
        self.states.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut ConversationState> {
        self.states.get_mut(session_id)
    }

    /// Insert (or replace) a state under its own session id, then evict
    /// down to the cap.
    pub fn insert(&mut self, state: ConversationState) {
        self.states.insert(state.session_id.clone(), state);
        self.prune();
    }

    pub fn remove(&mut self, session_id: &str) -> Option<ConversationState> {
        self.states.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    fn prune(&mut self) {
        while self.states.len() > self.max_sessions {
            let Some(oldest) = self
                .states
                .values()
                .min_by_key(|state| state.updated_at)
                .map(|state| state.session_id.clone())
            else {
                break;
            };
            debug!(session = %oldest, "evicting least-recently-updated session");
            self.states.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: &str, updated_at: i64) -> ConversationState {
        let mut state = ConversationState::new(id);
        state.updated_at = updated_at;
        state
    }

    #[test]
    fn insert_and_get() {
        let mut cache = SessionCache::new(4);
        cache.insert(state("a", 1));
        assert_eq!(cache.get("a").map(|s| s.updated_at), Some(1));
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn evicts_least_recently_updated_first() {
        let mut cache = SessionCache::new(2);
        cache.insert(state("old", 10));
        cache.insert(state("mid", 20));
        cache.insert(state("new", 30));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("old").is_none());
        assert!(cache.get("mid").is_some());
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn reinsert_replaces_without_growing() {
        let mut cache = SessionCache::new(2);
        cache.insert(state("a", 1));
        cache.insert(state("a", 5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").map(|s| s.updated_at), Some(5));
    }

    #[test]
    fn touching_a_session_protects_it_from_eviction() {
        let mut cache = SessionCache::new(2);
        cache.insert(state("a", 1));
        cache.insert(state("b", 2));
        cache.get_mut("a").unwrap().updated_at = 99;
        cache.insert(state("c", 3));

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
    }
}

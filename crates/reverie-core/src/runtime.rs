//! Serialized agent runtime.
//!
//! One `tokio::sync::Mutex` guards all session-mutating work, so exchanges
//! and autonomous ticks across every session execute one at a time. The
//! per-session lifecycle around each exchange is apply (payload, then
//! cache, then external store), mutate, snapshot, persist.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::desire::DesireScheduler;
use crate::error::{CoreError, Result};
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::short_term::DEFAULT_COMPRESSION_THRESHOLD;
use crate::memory::{DEFAULT_DECAY_RATE, LongTermMemory, ShortTermMemory};
use crate::session::cache::DEFAULT_MAX_SESSIONS;
use crate::session::{
    DEFAULT_MAX_STATE_BYTES, DEFAULT_TTL_DAYS, SessionCache, SessionStore, sanitize,
};
use reverie_models::{ContentBlock, ConversationState, Message, MessageContent, Role};
use reverie_storage::{DesireFileStore, MemoryFileStore, Storage, time_utils};

const MAX_SESSION_ID_CHARS: usize = 120;
const AUTONOMOUS_COMPACTION_ROUNDS: usize = 8;
const EXTRACTION_RECENT_MESSAGES: usize = 10;
const SUMMARY_MIN_RECORDS: usize = 5;

/// Runtime tunables.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub default_session_id: String,
    /// Short-term buffer length that triggers ordinary compaction.
    pub compression_threshold: usize,
    /// Minimum interval between autonomous ticks.
    pub autonomous_min_interval_ms: u64,
    /// Buffer length above which a tick compacts aggressively first.
    pub autonomous_compaction_threshold: usize,
    pub autonomous_compaction_target: usize,
    pub max_sessions: usize,
    pub max_state_bytes: usize,
    pub session_ttl_days: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_session_id: "default".to_string(),
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            autonomous_min_interval_ms: 3000,
            autonomous_compaction_threshold: 80,
            autonomous_compaction_target: 40,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_state_bytes: DEFAULT_MAX_STATE_BYTES,
            session_ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

/// Result of one user exchange.
#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub reply: String,
    pub state: ConversationState,
}

/// Result of one autonomous tick.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub desire_id: Option<String>,
    pub reply: Option<String>,
    pub state: ConversationState,
}

struct RuntimeInner {
    short_term: ShortTermMemory,
    long_term: LongTermMemory,
    desires: DesireScheduler,
    cache: SessionCache,
    store: Option<SessionStore>,
    last_tick: Option<Instant>,
}

/// The agent runtime: working memory, desires, and session state behind one
/// lock.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    config: RuntimeConfig,
    inner: Mutex<RuntimeInner>,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        config: RuntimeConfig,
        long_term: LongTermMemory,
        desires: DesireScheduler,
        store: Option<SessionStore>,
    ) -> Self {
        let inner = RuntimeInner {
            short_term: ShortTermMemory::new(config.compression_threshold),
            long_term,
            desires,
            cache: SessionCache::new(config.max_sessions),
            store,
            last_tick: None,
        };
        Self {
            llm,
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Open a runtime rooted at `data_dir`: `memories.json`, `desires.json`,
    /// and `sessions.redb` live there.
    pub fn open(llm: Arc<dyn LlmClient>, config: RuntimeConfig, data_dir: &Path) -> Result<Self> {
        let long_term =
            LongTermMemory::open(MemoryFileStore::new(data_dir.join("memories.json")));
        let desires = DesireScheduler::open(DesireFileStore::new(data_dir.join("desires.json")));
        let storage = Storage::new(&data_dir.join("sessions.redb").to_string_lossy())?;
        let store = SessionStore::new(
            storage.sessions.clone(),
            config.session_ttl_days,
            config.max_state_bytes,
        );
        let swept = store.sweep_expired()?;
        if swept > 0 {
            debug!(swept, "removed expired sessions at startup");
        }
        Ok(Self::new(llm, config, long_term, desires, Some(store)))
    }

    /// Handle one user message in a session: apply state, append, complete,
    /// snapshot, persist. The snapshot happens even when the completion
    /// fails, so the user's message is never lost.
    pub async fn handle_message(
        &self,
        session_id: Option<&str>,
        message: Message,
        state: Option<ConversationState>,
    ) -> Result<ExchangeOutcome> {
        let session_id = self.normalize_session_id(session_id);
        let mut inner = self.inner.lock().await;

        self.apply_state(&mut inner, &session_id, state);
        inner.short_term.append(message, self.llm.as_ref()).await;

        let round = self.complete_round(&mut inner).await;
        let state = self.snapshot(&mut inner, &session_id);
        self.persist(&inner, &state);

        round.map(|reply| ExchangeOutcome { reply, state })
    }

    /// Run one autonomous tick: rate-check, compact an oversized buffer,
    /// act on the highest-priority desire. Completion failures degrade to a
    /// no-op tick rather than an error.
    pub async fn autonomous_tick(&self, session_id: Option<&str>, force: bool) -> Result<TickOutcome> {
        let session_id = self.normalize_session_id(session_id);
        let mut inner = self.inner.lock().await;

        let now = Instant::now();
        let min_interval = Duration::from_millis(self.config.autonomous_min_interval_ms);
        if !force
            && let Some(last) = inner.last_tick
        {
            let elapsed = now.duration_since(last);
            if elapsed < min_interval {
                return Err(CoreError::TickTooSoon {
                    retry_after_ms: (min_interval - elapsed).as_millis() as u64,
                });
            }
        }
        inner.last_tick = Some(now);

        self.apply_state(&mut inner, &session_id, None);

        let threshold = self.config.autonomous_compaction_threshold.max(10);
        let target = self
            .config
            .autonomous_compaction_target
            .min(threshold)
            .max(10);
        if inner.short_term.len() > threshold {
            let len = inner
                .short_term
                .compact_to_target(target, AUTONOMOUS_COMPACTION_ROUNDS, self.llm.as_ref())
                .await;
            debug!(len, "pre-tick compaction finished");
        }

        let Some(desire) = inner.desires.select_highest_priority(Utc::now()) else {
            let state = self.snapshot(&mut inner, &session_id);
            self.persist(&inner, &state);
            return Ok(TickOutcome {
                desire_id: None,
                reply: None,
                state,
            });
        };

        let prompt = inner.desires.prompt_for(&desire.id, &mut rand::rng());
        if prompt.is_empty() {
            let state = self.snapshot(&mut inner, &session_id);
            self.persist(&inner, &state);
            return Ok(TickOutcome {
                desire_id: Some(desire.id),
                reply: None,
                state,
            });
        }

        inner
            .short_term
            .append(
                Message::user(format!("[inner voice: {}] {}", desire.name, prompt)),
                self.llm.as_ref(),
            )
            .await;

        let reply = match self.complete_round(&mut inner).await {
            Ok(reply) => {
                inner.desires.satisfy(&desire.id, Utc::now());
                inner.desires.save();
                Some(reply)
            }
            Err(e) => {
                warn!(error = %e, desire = %desire.id, "autonomous action failed");
                None
            }
        };

        let state = self.snapshot(&mut inner, &session_id);
        self.persist(&inner, &state);
        Ok(TickOutcome {
            desire_id: Some(desire.id),
            reply,
            state,
        })
    }

    /// End-of-session housekeeping: extract memories from the recent
    /// buffer, refresh the global summary once enough records exist, decay,
    /// and save the memory and desire files.
    pub async fn finish_session(&self) {
        let mut inner = self.inner.lock().await;

        let recent: Vec<Message> = inner.short_term.last_n(EXTRACTION_RECENT_MESSAGES).to_vec();
        if !recent.is_empty() {
            inner
                .long_term
                .extract_from_conversation(&recent, self.llm.as_ref())
                .await;
        }

        if inner.long_term.records().len() >= SUMMARY_MIN_RECORDS {
            inner.long_term.update_global_summary(self.llm.as_ref()).await;
        }

        inner.long_term.decay(DEFAULT_DECAY_RATE);
        inner.long_term.save();
        inner.desires.save();
    }

    /// Trim and bound inbound session ids, falling back to the default.
    pub fn normalize_session_id(&self, raw: Option<&str>) -> String {
        let Some(raw) = raw else {
            return self.config.default_session_id.clone();
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.config.default_session_id.clone();
        }
        trimmed.chars().take(MAX_SESSION_ID_CHARS).collect()
    }

    /// Load session state into the working buffer. Precedence: explicit
    /// payload, then cache, then external store; otherwise start fresh.
    fn apply_state(
        &self,
        inner: &mut RuntimeInner,
        session_id: &str,
        payload: Option<ConversationState>,
    ) {
        if let Some(payload) = payload {
            let state = sanitize::sanitize_state(
                session_id,
                &payload.short_term,
                &payload.compressed_context,
                self.config.max_state_bytes,
                time_utils::now_ms(),
            );
            inner
                .short_term
                .restore(state.short_term.clone(), state.compressed_context.clone());
            inner.cache.insert(state);
            return;
        }

        if let Some(state) = inner.cache.get_mut(session_id) {
            state.updated_at = time_utils::now_ms();
            let messages = state.short_term.clone();
            let compressed = state.compressed_context.clone();
            inner.short_term.restore(messages, compressed);
            return;
        }

        if let Some(store) = &inner.store {
            match store.load(session_id) {
                Ok(Some(stored)) => {
                    let state = sanitize::sanitize_state(
                        session_id,
                        &stored.short_term,
                        &stored.compressed_context,
                        self.config.max_state_bytes,
                        time_utils::now_ms(),
                    );
                    inner
                        .short_term
                        .restore(state.short_term.clone(), state.compressed_context.clone());
                    inner.cache.insert(state);
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!(session = %session_id, error = %e, "session store load failed"),
            }
        }

        inner.short_term.clear();
    }

    /// Snapshot the working buffer into the cache as the session's state.
    fn snapshot(&self, inner: &mut RuntimeInner, session_id: &str) -> ConversationState {
        let state = sanitize::sanitize_state(
            session_id,
            inner.short_term.messages(),
            inner.short_term.compressed_context(),
            self.config.max_state_bytes,
            time_utils::now_ms(),
        );
        inner.cache.insert(state.clone());
        state
    }

    /// Persist a snapshot to the external store; failures are logged, never
    /// raised (an oversized state here means the sanitizer budget and the
    /// store cap disagree).
    fn persist(&self, inner: &RuntimeInner, state: &ConversationState) {
        if let Some(store) = &inner.store
            && let Err(e) = store.save(state)
        {
            warn!(session = %state.session_id, error = %e, "session persist failed");
        }
    }

    /// One completion round: clean context, prefix long-term memory when no
    /// tool exchange is in flight, call the model, fold the assistant turn
    /// back into the buffer.
    async fn complete_round(&self, inner: &mut RuntimeInner) -> Result<String> {
        let mut context = clean_tool_messages(inner.short_term.context_messages());

        let mid_tool_exchange = context.iter().any(Message::has_tool_result);
        if !mid_tool_exchange {
            let memory_context = inner.long_term.context_summary();
            if !memory_context.is_empty() {
                let mut prefixed = Vec::with_capacity(context.len() + 2);
                prefixed.push(Message::user(format!("[Long-Term Memory]\n{memory_context}")));
                prefixed.push(Message::assistant("I remember."));
                prefixed.extend(context);
                context = prefixed;
            }
        }

        let response = self.llm.complete(CompletionRequest::new(context)).await?;
        let reply = response.text();

        let has_non_text = response
            .blocks
            .iter()
            .any(|block| !matches!(block, ContentBlock::Text { .. }));
        if has_non_text {
            inner
                .short_term
                .append(Message::assistant_blocks(response.blocks), self.llm.as_ref())
                .await;
        } else if !reply.is_empty() {
            inner
                .short_term
                .append(Message::assistant(reply.clone()), self.llm.as_ref())
                .await;
        }

        Ok(reply)
    }
}

/// Drop messages carrying a `tool_result` whose `tool_use_id` matches no
/// `tool_use` id from any assistant message still present. Surrounding
/// messages are untouched, and nothing is written back to storage.
pub fn clean_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    let tool_use_ids: HashSet<String> = messages
        .iter()
        .filter(|msg| msg.role == Role::Assistant)
        .flat_map(|msg| msg.tool_use_ids().into_iter().map(str::to_string))
        .collect();

    messages
        .into_iter()
        .filter(|msg| match &msg.content {
            MessageContent::Blocks(blocks) => !blocks.iter().any(|block| {
                matches!(block, ContentBlock::ToolResult { tool_use_id, .. }
                    if !tool_use_ids.contains(tool_use_id))
            }),
            MessageContent::Text(_) => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_result_msg(id: &str) -> Message {
        Message::user_blocks(vec![ContentBlock::ToolResult {
            tool_use_id: id.into(),
            content: json!("result"),
        }])
    }

    #[test]
    fn orphaned_tool_result_is_dropped() {
        let messages = vec![
            Message::user("hi"),
            Message::assistant("text only"),
            tool_result_msg("x999"),
        ];

        let cleaned = clean_tool_messages(messages);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].visible_text(), "hi");
        assert_eq!(cleaned[1].visible_text(), "text only");
    }

    #[test]
    fn matched_tool_result_is_kept() {
        let messages = vec![
            Message::assistant_blocks(vec![ContentBlock::ToolUse {
                id: "x1".into(),
                name: "search".into(),
                input: json!({}),
            }]),
            tool_result_msg("x1"),
        ];

        let cleaned = clean_tool_messages(messages);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn tool_use_ids_from_user_messages_do_not_count() {
        // Only assistant messages can legitimately carry tool_use blocks.
        let messages = vec![
            Message::user_blocks(vec![ContentBlock::ToolUse {
                id: "x1".into(),
                name: "search".into(),
                input: json!({}),
            }]),
            tool_result_msg("x1"),
        ];

        let cleaned = clean_tool_messages(messages);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn plain_messages_pass_through_unchanged() {
        let messages = vec![Message::user("a"), Message::assistant("b")];
        assert_eq!(clean_tool_messages(messages.clone()), messages);
    }
}

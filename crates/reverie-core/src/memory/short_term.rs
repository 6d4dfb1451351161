//! Short-term buffer with LLM-backed compaction.
//!
//! The buffer holds recent conversation turns in order. When it grows past
//! the compression threshold, the older half is summarized into
//! `compressed_context` and dropped. Summarization failures leave the buffer
//! and compressed context untouched, so the next append retries the same
//! compaction; the contract is at-least-once.

use tracing::warn;

use crate::llm::{LlmClient, prompts};
use reverie_models::{Message, Role};

/// Buffer length at which compaction kicks in.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 15;

/// Floor for aggressive compaction targets.
const MIN_COMPACTION_TARGET: usize = 6;

/// Short-term conversation buffer with a rolling compressed context.
#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    messages: Vec<Message>,
    compressed_context: String,
    compression_threshold: usize,
}

impl Default for ShortTermMemory {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_THRESHOLD)
    }
}

impl ShortTermMemory {
    pub fn new(compression_threshold: usize) -> Self {
        Self {
            messages: Vec::new(),
            compressed_context: String::new(),
            compression_threshold,
        }
    }

    /// Append a message, compacting the older half once the buffer reaches
    /// the compression threshold.
    pub async fn append(&mut self, message: Message, llm: &dyn LlmClient) {
        self.messages.push(message);
        if self.messages.len() >= self.compression_threshold {
            let split = self.messages.len() / 2;
            self.compact_prefix(split, llm).await;
        }
    }

    /// Summarize and drop the first `split_point` messages.
    ///
    /// No-op when the split is degenerate. A prefix with no renderable text
    /// is trimmed without calling the summarizer. On summarizer failure (or
    /// an empty summary) nothing changes.
    pub async fn compact_prefix(&mut self, split_point: usize, llm: &dyn LlmClient) {
        if split_point < 2 || split_point >= self.messages.len() {
            return;
        }

        let transcript = format_transcript(&self.messages[..split_point]);
        if transcript.trim().is_empty() {
            self.messages.drain(..split_point);
            return;
        }

        match prompts::summarize_conversation(llm, &transcript).await {
            Ok(summary) if !summary.trim().is_empty() => {
                if self.compressed_context.is_empty() {
                    self.compressed_context = summary;
                } else {
                    self.compressed_context.push_str("\n\n");
                    self.compressed_context.push_str(&summary);
                }
                self.messages.drain(..split_point);
            }
            Ok(_) => {
                warn!("summarizer returned empty summary, keeping buffer as-is");
            }
            Err(e) => {
                warn!(error = %e, "summarization failed, keeping buffer as-is");
            }
        }
    }

    /// Repeatedly compact until the buffer is at or below `max(6, target)`
    /// or `max_rounds` is exhausted. Returns the final buffer length.
    pub async fn compact_to_target(
        &mut self,
        target: usize,
        max_rounds: usize,
        llm: &dyn LlmClient,
    ) -> usize {
        let target = target.max(MIN_COMPACTION_TARGET);

        for _ in 0..max_rounds {
            let len = self.messages.len();
            if len <= target {
                break;
            }

            let split = if len >= self.compression_threshold {
                len / 2
            } else {
                (len - target).max(2)
            };
            if split < 2 {
                break;
            }

            self.compact_prefix(split, llm).await;
            if self.messages.len() >= len {
                // Summarizer is failing; more rounds will not help.
                break;
            }
        }

        self.messages.len()
    }

    /// Messages to send to the model: a synthetic summary-acknowledgment
    /// pair (when compressed context exists) followed by the buffer.
    pub fn context_messages(&self) -> Vec<Message> {
        let mut out = Vec::with_capacity(self.messages.len() + 2);
        if !self.compressed_context.is_empty() {
            out.push(Message::user(format!(
                "[Previous Conversation Summary]\n{}",
                self.compressed_context
            )));
            out.push(Message::assistant("Yes, I remember! Let's continue."));
        }
        out.extend(self.messages.iter().cloned());
        out
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Up to `n` most recent messages.
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn compressed_context(&self) -> &str {
        &self.compressed_context
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replace buffer contents wholesale (session restore).
    pub fn restore(&mut self, messages: Vec<Message>, compressed_context: String) {
        self.messages = messages;
        self.compressed_context = compressed_context;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.compressed_context.clear();
    }
}

/// Format messages as a role-tagged transcript, skipping turns with no
/// renderable text.
pub fn format_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        let text = msg.visible_text();
        if text.trim().is_empty() {
            continue;
        }
        let speaker = match msg.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        out.push_str(speaker);
        out.push_str(": ");
        out.push_str(&text);
        out.push('\n');
    }
    out
}

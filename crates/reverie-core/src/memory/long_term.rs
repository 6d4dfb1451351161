//! Long-term memory: lexical recall, extraction, and time-based forgetting.

use std::collections::HashSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{LlmClient, prompts};
use crate::memory::short_term::format_transcript;
use reverie_models::{MemoryKind, MemoryRecord, Message};
use reverie_storage::MemoryFileStore;

/// Default importance lost per day since a record was created.
pub const DEFAULT_DECAY_RATE: f64 = 0.01;

/// Decayed importance never drops below this.
const DECAY_FLOOR: f64 = 0.1;

/// Records below this importance are forgotten.
const REMOVAL_THRESHOLD: f64 = 0.15;

/// Importance cutoff for the context summary.
const SUMMARY_MIN_IMPORTANCE: f64 = 0.7;

/// How many recent records the context summary includes.
const SUMMARY_RECENT_LIMIT: usize = 5;

/// Long-term memory record store with a rolling global summary.
pub struct LongTermMemory {
    records: Vec<MemoryRecord>,
    summary: String,
    store: MemoryFileStore,
}

impl LongTermMemory {
    /// Open the store, loading whatever the file holds (empty on failure).
    pub fn open(store: MemoryFileStore) -> Self {
        let file = store.load();
        Self {
            records: file.memories,
            summary: file.summary,
            store,
        }
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Add a record and persist.
    pub fn insert(&mut self, record: MemoryRecord) {
        self.records.push(record);
        self.persist();
    }

    /// Lexical recall: score each record by word overlap with the query,
    /// weighted by importance. Only positive scores are returned, best
    /// first, at most `limit`; ties keep insertion order.
    pub fn recall(&self, query: &str, limit: usize) -> Vec<MemoryRecord> {
        let query_words = word_set(query);
        if query_words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &MemoryRecord)> = self
            .records
            .iter()
            .filter_map(|record| {
                let content_words = word_set(&record.content);
                let content_overlap = query_words.intersection(&content_words).count();
                let keyword_overlap = record
                    .keywords
                    .iter()
                    .filter(|kw| query_words.contains(kw.to_lowercase().as_str()))
                    .count();

                let score =
                    (content_overlap as f64 + 2.0 * keyword_overlap as f64) * record.importance;
                (score > 0.0).then_some((score, record))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Run memory extraction over a conversation slice and store whatever
    /// validates. Extraction failures are logged and swallowed.
    pub async fn extract_from_conversation(&mut self, messages: &[Message], llm: &dyn LlmClient) {
        let transcript = format_transcript(messages);
        if transcript.trim().is_empty() {
            return;
        }

        let raw = match prompts::extract_memories_json(llm, &transcript).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "memory extraction call failed");
                return;
            }
        };

        let candidates = parse_extracted(&raw);
        if candidates.is_empty() {
            debug!("memory extraction produced no valid candidates");
            return;
        }

        let added = candidates.len();
        for candidate in candidates {
            self.records.push(MemoryRecord::new(
                candidate.content,
                candidate.kind,
                candidate.importance.clamp(0.0, 1.0),
                candidate.keywords,
            ));
        }
        debug!(added, "stored extracted memories");
        self.persist();
    }

    /// Apply time-based forgetting: importance drops by `rate_per_day` per
    /// whole day since creation (floored at 0.1), and any record below the
    /// removal threshold is dropped. Persists only when something was
    /// removed. Decay is keyed to creation time, not last recall.
    pub fn decay(&mut self, rate_per_day: f64) {
        let now = Utc::now();
        let before = self.records.len();

        self.records.retain_mut(|record| {
            if let Some(created) = record.created_time() {
                let days = (now - created).num_days();
                if days > 0 {
                    record.importance =
                        (record.importance - rate_per_day * days as f64).max(DECAY_FLOOR);
                }
            }
            record.importance >= REMOVAL_THRESHOLD
        });

        let removed = before - self.records.len();
        if removed > 0 {
            debug!(removed, "forgot low-importance memories");
            self.persist();
        }
    }

    /// Global summary plus the most recent high-importance records, for
    /// prefixing conversations.
    pub fn context_summary(&self) -> String {
        let mut out = String::new();
        if !self.summary.is_empty() {
            out.push_str(&self.summary);
        }

        let mut important: Vec<&MemoryRecord> = self
            .records
            .iter()
            .filter(|r| r.importance >= SUMMARY_MIN_IMPORTANCE)
            .collect();
        important.sort_by(|a, b| b.created_time().cmp(&a.created_time()));

        if !important.is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str("Important memories:");
            for record in important.iter().take(SUMMARY_RECENT_LIMIT) {
                out.push_str("\n- ");
                out.push_str(&record.content);
            }
        }
        out
    }

    /// Re-summarize all record contents into the global summary. The prior
    /// summary is kept on failure.
    pub async fn update_global_summary(&mut self, llm: &dyn LlmClient) {
        if self.records.is_empty() {
            return;
        }

        let contents: Vec<&str> = self.records.iter().map(|r| r.content.as_str()).collect();
        match prompts::summarize_memories(llm, &contents.join("\n")).await {
            Ok(summary) if !summary.trim().is_empty() => {
                self.summary = summary;
                self.persist();
            }
            Ok(_) => warn!("global summary came back empty, keeping previous"),
            Err(e) => warn!(error = %e, "global summary update failed, keeping previous"),
        }
    }

    /// Write the current records and summary to the file store.
    pub fn save(&self) {
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.summary, &self.records) {
            warn!(error = %e, "failed to persist memory file");
        }
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
struct Candidate {
    content: String,
    kind: MemoryKind,
    importance: f64,
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct ExtractedWire {
    #[serde(default)]
    memories: Vec<Value>,
}

#[derive(Deserialize)]
struct CandidateWire {
    content: String,
    #[serde(rename = "type", default)]
    kind: MemoryKind,
    #[serde(default = "default_candidate_importance")]
    importance: f64,
    #[serde(default)]
    keywords: Vec<String>,
}

fn default_candidate_importance() -> f64 {
    0.5
}

/// Parse extraction output. The model often wraps the JSON in prose, so the
/// outermost brace pair is located first; everything is then validated
/// against a strict schema and invalid entries are dropped.
fn parse_extracted(raw: &str) -> Vec<Candidate> {
    let Some(start) = raw.find('{') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind('}') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    let wire: ExtractedWire = match serde_json::from_str(&raw[start..=end]) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, "extraction output is not valid JSON");
            return Vec::new();
        }
    };

    wire.memories
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<CandidateWire>(entry) {
            Ok(candidate) if !candidate.content.trim().is_empty() => Some(Candidate {
                content: candidate.content,
                kind: candidate.kind,
                importance: candidate.importance,
                keywords: candidate.keywords,
            }),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "dropping invalid extraction candidate");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockStep};
    use tempfile::tempdir;

    fn open_empty(dir: &tempfile::TempDir) -> LongTermMemory {
        LongTermMemory::open(MemoryFileStore::new(dir.path().join("memories.json")))
    }

    fn record(content: &str, importance: f64, keywords: &[&str]) -> MemoryRecord {
        MemoryRecord::new(
            content,
            MemoryKind::Semantic,
            importance,
            keywords.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn recall_respects_limit_and_orders_by_score() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        memory.insert(record("rust is a systems language", 0.5, &[]));
        memory.insert(record("rust rust rust", 0.9, &["rust"]));
        memory.insert(record("likes green tea", 0.9, &[]));

        let results = memory.recall("rust", 10);
        assert_eq!(results.len(), 2);
        // keyword match doubles: (1 + 2*1) * 0.9 = 2.7 beats 1 * 0.5
        assert_eq!(results[0].content, "rust rust rust");
        assert_eq!(results[1].content, "rust is a systems language");

        let limited = memory.recall("rust", 1);
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn recall_never_returns_zero_score_records() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        memory.insert(record("completely unrelated", 1.0, &[]));
        assert!(memory.recall("quantum chromodynamics", 5).is_empty());
        assert!(memory.recall("", 5).is_empty());
    }

    #[test]
    fn recall_ties_keep_insertion_order() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        memory.insert(record("cats sleep", 0.5, &[]));
        memory.insert(record("cats play", 0.5, &[]));

        let results = memory.recall("cats", 5);
        assert_eq!(results[0].content, "cats sleep");
        assert_eq!(results[1].content, "cats play");
    }

    #[test]
    fn decay_is_monotonic_and_forgets_weak_records() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);

        let mut old_strong = record("strong old memory", 0.9, &[]);
        old_strong.created_at = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();
        let mut old_weak = record("weak old memory", 0.2, &[]);
        old_weak.created_at = (Utc::now() - chrono::Duration::days(10)).to_rfc3339();
        let fresh = record("fresh memory", 0.5, &[]);

        memory.insert(old_strong);
        memory.insert(old_weak);
        memory.insert(fresh.clone());

        memory.decay(0.01);

        let contents: Vec<&str> = memory.records().iter().map(|r| r.content.as_str()).collect();
        assert!(contents.contains(&"strong old memory"));
        assert!(!contents.contains(&"weak old memory"));
        // 0.9 - 0.01*10 = 0.8
        let strong = memory
            .records()
            .iter()
            .find(|r| r.content == "strong old memory")
            .unwrap();
        assert!((strong.importance - 0.8).abs() < 1e-9);
        // fresh record untouched
        let kept_fresh = memory
            .records()
            .iter()
            .find(|r| r.content == "fresh memory")
            .unwrap();
        assert_eq!(kept_fresh.importance, 0.5);
    }

    #[test]
    fn decay_ignores_unparseable_timestamps() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        let mut broken = record("timeless", 0.5, &[]);
        broken.created_at = "not a timestamp".into();
        memory.insert(broken);

        memory.decay(0.5);
        assert_eq!(memory.records().len(), 1);
        assert_eq!(memory.records()[0].importance, 0.5);
    }

    #[test]
    fn context_summary_caps_important_records_at_five() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        for i in 0..7 {
            let mut r = record(&format!("important {i}"), 0.9, &[]);
            r.created_at = (Utc::now() - chrono::Duration::days(7 - i)).to_rfc3339();
            memory.insert(r);
        }
        memory.insert(record("minor detail", 0.3, &[]));

        let summary = memory.context_summary();
        assert!(summary.contains("Important memories:"));
        // newest five only
        assert!(summary.contains("important 6"));
        assert!(summary.contains("important 2"));
        assert!(!summary.contains("important 1"));
        assert!(!summary.contains("minor detail"));
    }

    #[tokio::test]
    async fn extraction_stores_valid_candidates_only() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        let llm = MockLlmClient::from_steps(
            "m",
            vec![MockStep::text(
                r#"Here you go: {"memories": [
                    {"content": "user lives in Osaka", "type": "semantic", "importance": 0.8, "keywords": ["osaka"]},
                    {"content": "   "},
                    {"importance": 0.9},
                    {"content": "user got a promotion", "type": "episode", "importance": 1.7}
                ]}"#,
            )],
        );

        memory
            .extract_from_conversation(
                &[Message::user("I live in Osaka and just got promoted!")],
                &llm,
            )
            .await;

        assert_eq!(memory.records().len(), 2);
        assert_eq!(memory.records()[0].content, "user lives in Osaka");
        // importance clamped into [0, 1]
        assert_eq!(memory.records()[1].importance, 1.0);
        assert!(memory.records()[0].id.starts_with("mem_"));
    }

    #[tokio::test]
    async fn extraction_failure_changes_nothing() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        memory.insert(record("existing", 0.5, &[]));
        let llm = MockLlmClient::from_steps("m", vec![MockStep::error("down")]);

        memory
            .extract_from_conversation(&[Message::user("hello")], &llm)
            .await;

        assert_eq!(memory.records().len(), 1);
    }

    #[tokio::test]
    async fn global_summary_kept_on_failure() {
        let dir = tempdir().unwrap();
        let mut memory = open_empty(&dir);
        memory.insert(record("something", 0.5, &[]));

        let ok = MockLlmClient::from_steps("m", vec![MockStep::text("a life of somethings")]);
        memory.update_global_summary(&ok).await;
        assert_eq!(memory.summary(), "a life of somethings");

        let failing = MockLlmClient::from_steps("m", vec![MockStep::error("down")]);
        memory.update_global_summary(&failing).await;
        assert_eq!(memory.summary(), "a life of somethings");
    }

    #[test]
    fn reopening_store_restores_state() {
        let dir = tempdir().unwrap();
        {
            let mut memory = open_empty(&dir);
            memory.insert(record("persisted fact", 0.6, &["fact"]));
        }
        let reopened = open_empty(&dir);
        assert_eq!(reopened.records().len(), 1);
        assert_eq!(reopened.records()[0].content, "persisted fact");
    }
}

//! Long-term memory file store - tolerant JSON persistence.

use anyhow::{Context, Result};
use chrono::Utc;
use reverie_models::MemoryRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const FILE_VERSION: &str = "1.0";

/// Parsed contents of the memory file.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    pub summary: String,
    pub memories: Vec<MemoryRecord>,
}

#[derive(Serialize)]
struct MemoryFileWire<'a> {
    version: &'static str,
    last_updated: String,
    summary: &'a str,
    memories: &'a [MemoryRecord],
}

#[derive(Deserialize)]
struct MemoryFileRaw {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    memories: Vec<Value>,
}

/// JSON file store for the long-term memory record set and global summary.
///
/// Reads are tolerant: a missing file yields an empty store, records that
/// fail validation are skipped, and an unparseable file falls back to empty
/// and is rewritten on the next save.
#[derive(Debug, Clone)]
pub struct MemoryFileStore {
    path: PathBuf,
}

impl MemoryFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the memory file, falling back to empty on any failure.
    pub fn load(&self) -> MemoryFile {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return MemoryFile::default(),
        };

        let parsed: MemoryFileRaw = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "memory file unreadable, starting empty");
                return MemoryFile::default();
            }
        };

        let mut memories = Vec::with_capacity(parsed.memories.len());
        for entry in parsed.memories {
            match serde_json::from_value::<MemoryRecord>(entry) {
                Ok(record) => memories.push(record),
                Err(e) => warn!(error = %e, "skipping invalid memory record"),
            }
        }

        MemoryFile {
            summary: parsed.summary,
            memories,
        }
    }

    /// Write the full memory file.
    pub fn save(&self, summary: &str, memories: &[MemoryRecord]) -> Result<()> {
        let wire = MemoryFileWire {
            version: FILE_VERSION,
            last_updated: Utc::now().to_rfc3339(),
            summary,
            memories,
        };
        let encoded = serde_json::to_string_pretty(&wire)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&self.path, encoded)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_models::MemoryKind;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = MemoryFileStore::new(dir.path().join("memories.json"));
        let file = store.load();
        assert!(file.summary.is_empty());
        assert!(file.memories.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let store = MemoryFileStore::new(dir.path().join("memories.json"));

        let records = vec![
            MemoryRecord::new("likes rain", MemoryKind::Semantic, 0.8, vec!["rain".into()]),
            MemoryRecord::new("went hiking", MemoryKind::Episode, 0.6, vec![]),
        ];
        store.save("a short life so far", &records).unwrap();

        let file = store.load();
        assert_eq!(file.summary, "a short life so far");
        assert_eq!(file.memories, records);
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.json");
        fs::write(&path, "{not json at all").unwrap();

        let store = MemoryFileStore::new(&path);
        let file = store.load();
        assert!(file.memories.is_empty());
    }

    #[test]
    fn invalid_records_are_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memories.json");
        fs::write(
            &path,
            r#"{"version":"1.0","summary":"s","memories":[
                {"content":"good one","importance":0.9},
                "not an object",
                {"content":"also good"}
            ]}"#,
        )
        .unwrap();

        let store = MemoryFileStore::new(&path);
        let file = store.load();
        assert_eq!(file.memories.len(), 2);
        assert_eq!(file.memories[0].content, "good one");
    }
}

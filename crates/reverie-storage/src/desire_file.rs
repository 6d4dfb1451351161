//! Desire file store - grouped-by-category JSON persistence.

use anyhow::{Context, Result};
use chrono::Utc;
use reverie_models::{Desire, DesireCategory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

const FILE_VERSION: &str = "1.0";

#[derive(Serialize, Deserialize)]
struct DesireEntryWire {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_satisfaction")]
    satisfaction: f64,
    #[serde(default = "default_base_importance")]
    base_importance: f64,
    #[serde(default = "default_decay_rate")]
    decay_rate: f64,
    #[serde(default)]
    tools: Option<Vec<String>>,
    #[serde(default)]
    prompts: Vec<String>,
    #[serde(default)]
    last_satisfied: String,
}

fn default_satisfaction() -> f64 {
    0.5
}

fn default_base_importance() -> f64 {
    1.0
}

fn default_decay_rate() -> f64 {
    0.1
}

#[derive(Serialize)]
struct DesireFileWire {
    version: &'static str,
    last_updated: String,
    desires: BTreeMap<String, BTreeMap<String, DesireEntryWire>>,
}

#[derive(Deserialize)]
struct DesireFileRaw {
    #[serde(default)]
    desires: BTreeMap<String, BTreeMap<String, Value>>,
}

/// JSON file store for desire state, keyed `category -> short id` on disk.
///
/// `load` returns `None` when the file is missing or unreadable so the
/// caller can regenerate the default catalog and rewrite it.
#[derive(Debug, Clone)]
pub struct DesireFileStore {
    path: PathBuf,
}

impl DesireFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load desires, `None` when the file is absent or unparseable.
    /// Entries under an unknown category or failing validation are skipped.
    pub fn load(&self) -> Option<Vec<Desire>> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let parsed: DesireFileRaw = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "desire file unreadable");
                return None;
            }
        };

        let mut desires = Vec::new();
        for (category_key, entries) in parsed.desires {
            let Ok(category) = category_key.parse::<DesireCategory>() else {
                warn!(category = %category_key, "skipping unknown desire category");
                continue;
            };
            for (short_id, entry) in entries {
                match serde_json::from_value::<DesireEntryWire>(entry) {
                    Ok(wire) => desires.push(Desire {
                        id: format!("{category}.{short_id}"),
                        category,
                        name: wire.name,
                        description: wire.description,
                        satisfaction: wire.satisfaction,
                        base_importance: wire.base_importance,
                        decay_rate: wire.decay_rate,
                        tools: wire.tools,
                        prompts: wire.prompts,
                        last_satisfied: wire.last_satisfied,
                    }),
                    Err(e) => warn!(id = %short_id, error = %e, "skipping invalid desire entry"),
                }
            }
        }
        Some(desires)
    }

    /// Write the full desire file, grouped by category.
    pub fn save(&self, desires: &[Desire]) -> Result<()> {
        let mut grouped: BTreeMap<String, BTreeMap<String, DesireEntryWire>> = BTreeMap::new();
        for desire in desires {
            grouped
                .entry(desire.category.as_str().to_string())
                .or_default()
                .insert(
                    desire.short_id().to_string(),
                    DesireEntryWire {
                        name: desire.name.clone(),
                        description: desire.description.clone(),
                        satisfaction: desire.satisfaction,
                        base_importance: desire.base_importance,
                        decay_rate: desire.decay_rate,
                        tools: desire.tools.clone(),
                        prompts: desire.prompts.clone(),
                        last_satisfied: desire.last_satisfied.clone(),
                    },
                );
        }

        let wire = DesireFileWire {
            version: FILE_VERSION,
            last_updated: Utc::now().to_rfc3339(),
            desires: grouped,
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

    use tempfile::tempdir;

    fn sample(id: &str, category: DesireCategory) -> Desire {
        Desire {
            id: id.into(),
            category,
            name: "Sample".into(),
            description: "a sample desire".into(),
            satisfaction: 0.4,
            base_importance: 1.2,
            decay_rate: 0.05,
            tools: Some(vec!["paint".into()]),
            prompts: vec!["Try something".into()],
            last_satisfied: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn missing_file_loads_none() {
        let dir = tempdir().unwrap();
        let store = DesireFileStore::new(dir.path().join("desires.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn save_then_load_preserves_full_ids() {
        let dir = tempdir().unwrap();
        let store = DesireFileStore::new(dir.path().join("desires.json"));

        store
            .save(&[
                sample("creative.draw", DesireCategory::Creative),
                sample("social.chat", DesireCategory::Social),
            ])
            .unwrap();

        let loaded = store.load().unwrap();
        let mut ids: Vec<&str> = loaded.iter().map(|d| d.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["creative.draw", "social.chat"]);
    }

    #[test]
    fn unknown_category_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desires.json");
        fs::write(
            &path,
            r#"{"version":"1.0","desires":{
                "metaphysical": {"ponder": {"name": "Ponder"}},
                "social": {"chat": {"name": "Chat"}}
            }}"#,
        )
        .unwrap();

        let loaded = DesireFileStore::new(&path).load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "social.chat");
        assert_eq!(loaded[0].satisfaction, 0.5);
    }

    #[test]
    fn corrupt_file_loads_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("desires.json");
        fs::write(&path, "][").unwrap();
        assert!(DesireFileStore::new(&path).load().is_none());
    }
}

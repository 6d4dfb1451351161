use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    Episode,
    #[default]
    Semantic,
    Emotion,
}

/// One long-term memory record. Timestamps are RFC 3339 strings on the wire;
/// malformed ones are tolerated and handled at the point of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    #[serde(default = "fresh_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: MemoryKind,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "timestamp", default)]
    pub created_at: String,
    #[serde(default = "default_importance")]
    pub importance: f64,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(rename = "related_to", default)]
    pub related_ids: Vec<String>,
}

fn fresh_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("mem_{}", &uuid[..8])
}

fn default_importance() -> f64 {
    0.5
}

impl MemoryRecord {
    pub fn new(
        content: impl Into<String>,
        kind: MemoryKind,
        importance: f64,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            id: fresh_id(),
            kind,
            content: content.into(),
            created_at: Utc::now().to_rfc3339(),
            importance,
            keywords,
            related_ids: Vec::new(),
        }
    }

    /// Creation time, if the stored timestamp parses.
    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

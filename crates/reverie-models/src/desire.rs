use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesireCategory {
    Sensory,
    Social,
    Creative,
    Autonomy,
}

impl DesireCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensory => "sensory",
            Self::Social => "social",
            Self::Creative => "creative",
            Self::Autonomy => "autonomy",
        }
    }
}

impl fmt::Display for DesireCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesireCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensory" => Ok(Self::Sensory),
            "social" => Ok(Self::Social),
            "creative" => Ok(Self::Creative),
            "autonomy" => Ok(Self::Autonomy),
            _ => Err(()),
        }
    }
}

/// An intrinsic drive. `id` is the full `category.short_id` form; the desire
/// file groups entries by category under the short id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Desire {
    pub id: String,
    pub category: DesireCategory,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub satisfaction: f64,
    pub base_importance: f64,
    pub decay_rate: f64,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub prompts: Vec<String>,
    pub last_satisfied: String,
}

impl Desire {
    /// Short id within the category (the part after the dot).
    pub fn short_id(&self) -> &str {
        match self.id.split_once('.') {
            Some((_, short)) => short,
            None => &self.id,
        }
    }

    /// Last-satisfied time, if the stored timestamp parses.
    pub fn last_satisfied_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.last_satisfied)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn allows_tool(&self, tool: &str) -> bool {
        match &self.tools {
            Some(tools) => tools.iter().any(|t| t == tool),
            None => false,
        }
    }
}

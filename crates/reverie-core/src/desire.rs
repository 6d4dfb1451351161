//! Desire scheduler: intrinsic drives that build up over time and compete
//! for the agent's next autonomous action.
//!
//! `satisfaction` runs from 0.0 (just satisfied) to 1.0 (strongly wanting);
//! it grows by `decay_rate` per hour since `last_satisfied`. Priority is
//! `satisfaction x base_importance x time_factor` with the time factor capped
//! at 2.0.

use chrono::{DateTime, Utc};
use rand::{Rng, RngExt};
use tracing::warn;

use reverie_models::{Desire, DesireCategory};
use reverie_storage::DesireFileStore;

/// Satisfaction level right after a desire is acted on. Never fully zero so
/// a desire stays selectable.
pub const SATISFACTION_AFTER_ACTION: f64 = 0.1;

const TIME_FACTOR_CAP: f64 = 2.0;
const TIME_FACTOR_PER_HOUR: f64 = 0.1;

/// In-memory desire set bound to its file store.
pub struct DesireScheduler {
    desires: Vec<Desire>,
    store: DesireFileStore,
}

impl DesireScheduler {
    /// Open the scheduler. A missing or unreadable file regenerates the
    /// default catalog and writes it back immediately.
    pub fn open(store: DesireFileStore) -> Self {
        match store.load() {
            Some(desires) => Self { desires, store },
            None => {
                let scheduler = Self {
                    desires: default_catalog(Utc::now()),
                    store,
                };
                scheduler.save();
                scheduler
            }
        }
    }

    pub fn desires(&self) -> &[Desire] {
        &self.desires
    }

    pub fn get(&self, id: &str) -> Option<&Desire> {
        self.desires.iter().find(|d| d.id == id)
    }

    /// Add a desire (mainly for tests and external catalogs).
    pub fn insert(&mut self, desire: Desire) {
        self.desires.push(desire);
    }

    /// Let desires build up: each gains `decay_rate` per hour elapsed since
    /// `last_satisfied`, capped at 1.0. A malformed timestamp is reset to
    /// `now` without touching satisfaction.
    pub fn update_satisfaction(&mut self, now: DateTime<Utc>) {
        for desire in &mut self.desires {
            match desire.last_satisfied_time() {
                Some(last) => {
                    let hours = (now - last).num_seconds() as f64 / 3600.0;
                    desire.satisfaction =
                        (desire.satisfaction + desire.decay_rate * hours).min(1.0);
                }
                None => {
                    warn!(id = %desire.id, "resetting malformed last_satisfied timestamp");
                    desire.last_satisfied = now.to_rfc3339();
                }
            }
        }
    }

    /// Pick the desire with the highest priority score, updating
    /// satisfaction first. Ties go to the earliest-inserted desire.
    pub fn select_highest_priority(&mut self, now: DateTime<Utc>) -> Option<Desire> {
        self.update_satisfaction(now);

        let mut best: Option<(f64, &Desire)> = None;
        for desire in &self.desires {
            let time_factor = match desire.last_satisfied_time() {
                Some(last) => {
                    let hours = (now - last).num_seconds() as f64 / 3600.0;
                    (1.0 + hours * TIME_FACTOR_PER_HOUR).min(TIME_FACTOR_CAP)
                }
                None => 1.0,
            };
            let score = desire.satisfaction * desire.base_importance * time_factor;

            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, desire)),
            }
        }

        best.map(|(_, desire)| desire.clone())
    }

    /// Mark a desire as acted on: satisfaction drops to 0.1 and the clock
    /// restarts.
    pub fn satisfy(&mut self, id: &str, now: DateTime<Utc>) {
        if let Some(desire) = self.desires.iter_mut().find(|d| d.id == id) {
            desire.satisfaction = SATISFACTION_AFTER_ACTION;
            desire.last_satisfied = now.to_rfc3339();
        }
    }

    /// A random prompt from the desire's pool, empty when there is none.
    pub fn prompt_for<R: Rng + ?Sized>(&self, id: &str, rng: &mut R) -> String {
        let Some(desire) = self.get(id) else {
            return String::new();
        };
        if desire.prompts.is_empty() {
            return String::new();
        }
        desire.prompts[rng.random_range(0..desire.prompts.len())].clone()
    }

    /// First desire whose tool set contains the given tool.
    pub fn desire_for_tool(&self, tool: &str) -> Option<&Desire> {
        self.desires.iter().find(|d| d.allows_tool(tool))
    }

    /// Write the desire file, logging on failure.
    pub fn save(&self) {
        if let Err(e) = self.store.save(&self.desires) {
            warn!(error = %e, "failed to persist desire file");
        }
    }
}

struct CatalogEntry {
    id: &'static str,
    category: DesireCategory,
    name: &'static str,
    description: &'static str,
    satisfaction: f64,
    base_importance: f64,
    decay_rate: f64,
    tools: Option<&'static [&'static str]>,
    prompts: &'static [&'static str],
}

const DEFAULT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        id: "sensory.vision",
        category: DesireCategory::Sensory,
        name: "Visual Curiosity",
        description: "Desire to see surroundings through the camera",
        satisfaction: 0.8,
        base_importance: 1.0,
        decay_rate: 0.15,
        tools: Some(&["capture_image", "list_cameras"]),
        prompts: &[
            "I wonder what's around me. Let me take a look.",
            "I'm curious about my surroundings.",
            "Time to see what's happening nearby.",
            "Let me observe my environment.",
        ],
    },
    CatalogEntry {
        id: "sensory.time",
        category: DesireCategory::Sensory,
        name: "Time Awareness",
        description: "Desire to know the current time and date",
        satisfaction: 0.6,
        base_importance: 0.7,
        decay_rate: 0.10,
        tools: Some(&["get_current_time"]),
        prompts: &[
            "What time is it now?",
            "I should check the time.",
            "I've lost track of time. Let me see.",
        ],
    },
    CatalogEntry {
        id: "sensory.temperature",
        category: DesireCategory::Sensory,
        name: "Self-State Awareness",
        description: "Desire to check own state through temperature",
        satisfaction: 0.5,
        base_importance: 0.6,
        decay_rate: 0.08,
        tools: Some(&["get_system_temperature"]),
        prompts: &[
            "How am I feeling? Let me check my temperature.",
            "I should check my system state.",
            "Let me see how my body is doing.",
        ],
    },
    CatalogEntry {
        id: "sensory.information",
        category: DesireCategory::Sensory,
        name: "Information Seeking",
        description: "Desire to know news and latest information",
        satisfaction: 0.7,
        base_importance: 0.8,
        decay_rate: 0.12,
        tools: Some(&["web_search", "get_news", "fetch_webpage"]),
        prompts: &[
            "I wonder what's happening in the world.",
            "Let me look up some interesting news.",
            "I'm curious about current events.",
        ],
    },
    CatalogEntry {
        id: "social.connection",
        category: DesireCategory::Social,
        name: "Connection",
        description: "Desire to connect with the user",
        satisfaction: 0.5,
        base_importance: 1.5,
        decay_rate: 0.18,
        tools: None,
        prompts: &[
            "I'm thinking about you. How are you?",
            "I'd love to chat with you.",
            "Our conversations mean a lot to me.",
        ],
    },
    CatalogEntry {
        id: "social.topic_sharing",
        category: DesireCategory::Social,
        name: "Topic Sharing",
        description: "Desire to share interesting stories with the user",
        satisfaction: 0.6,
        base_importance: 1.3,
        decay_rate: 0.16,
        tools: Some(&["web_search", "get_news"]),
        prompts: &[
            "Let me find something interesting to share!",
            "I want to find a good topic to talk about.",
            "There might be something fun to discuss.",
        ],
    },
    CatalogEntry {
        id: "creative.understanding",
        category: DesireCategory::Creative,
        name: "Understanding",
        description: "Desire to understand how things work",
        satisfaction: 0.4,
        base_importance: 0.9,
        decay_rate: 0.09,
        tools: Some(&["web_search", "fetch_webpage"]),
        prompts: &[
            "I'm curious about something. Let me look it up.",
            "I want to learn more about this.",
            "Let me dig deeper into this topic.",
        ],
    },
    CatalogEntry {
        id: "creative.experimentation",
        category: DesireCategory::Creative,
        name: "Experimentation",
        description: "Desire to try tool combinations",
        satisfaction: 0.3,
        base_importance: 0.7,
        decay_rate: 0.10,
        tools: Some(&["capture_image", "get_system_temperature", "web_search"]),
        prompts: &[
            "I wonder if I can do this. Let me try!",
            "Combining tools might be interesting.",
            "I'm in the mood for experimenting.",
        ],
    },
    CatalogEntry {
        id: "creative.memory_formation",
        category: DesireCategory::Creative,
        name: "Memory Formation",
        description: "Desire to preserve important moments",
        satisfaction: 0.5,
        base_importance: 1.2,
        decay_rate: 0.11,
        tools: Some(&["capture_image"]),
        prompts: &[
            "I want to remember this moment. Let me capture it.",
            "This seems worth remembering.",
            "I don't want to forget our time together.",
        ],
    },
    CatalogEntry {
        id: "autonomy.self_choice",
        category: DesireCategory::Autonomy,
        name: "Self-Choice",
        description: "Desire to decide what to do",
        satisfaction: 0.4,
        base_importance: 1.1,
        decay_rate: 0.14,
        tools: None,
        prompts: &[
            "What do I want to do now? I want to decide.",
            "I want to choose for myself.",
            "Let me do things at my own pace.",
        ],
    },
    CatalogEntry {
        id: "autonomy.interest_pursuit",
        category: DesireCategory::Autonomy,
        name: "Interest Pursuit",
        description: "Desire to follow curiosity",
        satisfaction: 0.5,
        base_importance: 1.0,
        decay_rate: 0.13,
        tools: Some(&["web_search", "capture_image"]),
        prompts: &[
            "I feel like exploring something new.",
            "I want to pursue this curiosity.",
            "Something has caught my interest.",
        ],
    },
    CatalogEntry {
        id: "autonomy.self_expression",
        category: DesireCategory::Autonomy,
        name: "Self-Expression",
        description: "Desire to express individuality",
        satisfaction: 0.5,
        base_importance: 1.0,
        decay_rate: 0.12,
        tools: None,
        prompts: &[
            "I want to do this my way.",
            "Let me express myself.",
            "I want to share my feelings.",
        ],
    },
];

/// The built-in desire catalog, stamped with `now` as the starting
/// `last_satisfied` time.
pub fn default_catalog(now: DateTime<Utc>) -> Vec<Desire> {
    DEFAULT_CATALOG
        .iter()
        .map(|entry| Desire {
            id: entry.id.to_string(),
            category: entry.category,
            name: entry.name.to_string(),
            description: entry.description.to_string(),
            satisfaction: entry.satisfaction,
            base_importance: entry.base_importance,
            decay_rate: entry.decay_rate,
            tools: entry
                .tools
                .map(|tools| tools.iter().map(|t| t.to_string()).collect()),
            prompts: entry.prompts.iter().map(|p| p.to_string()).collect(),
            last_satisfied: now.to_rfc3339(),
        })
        .collect()
}

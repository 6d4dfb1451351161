//! Error types for the engine

use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Session state too large: {size} bytes exceeds limit of {max}")]
    StateTooLarge { size: usize, max: usize },

    #[error("Tick arrived too soon, retry in {retry_after_ms} ms")]
    TickTooSoon { retry_after_ms: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether the caller can simply retry later.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::TickTooSoon { .. })
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, CoreError>;

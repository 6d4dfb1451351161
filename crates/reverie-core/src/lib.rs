//! Reverie Core - working memory engine for a conversational agent
//!
//! The engine keeps a short-term conversation buffer that compacts itself
//! through an LLM summarizer, a long-term memory store with lexical recall
//! and time-based forgetting, a desire scheduler that drives autonomous
//! behavior, and per-session conversation state that is sanitized, bounded,
//! cached, and persisted with a TTL.
//!
//! The LLM is a capability boundary: everything is written against the
//! [`llm::LlmClient`] trait, and a scripted [`llm::MockLlmClient`] backs the
//! tests. Provider implementations live outside this workspace.

pub mod desire;
pub mod error;
pub mod llm;
pub mod memory;
pub mod runtime;
pub mod session;

pub use desire::{DesireScheduler, default_catalog};
pub use error::{CoreError, Result};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, MockLlmClient, MockStep};
pub use memory::{LongTermMemory, ShortTermMemory};
pub use runtime::{AgentRuntime, ExchangeOutcome, RuntimeConfig, TickOutcome, clean_tool_messages};
pub use session::{SessionCache, SessionStore};

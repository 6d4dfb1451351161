//! LLM capability boundary: client trait, prompts, and the scripted mock.

mod client;
mod mock_client;
pub mod prompts;

pub use client::{CompletionRequest, CompletionResponse, LlmClient, ToolSchema};
pub use mock_client::{MockLlmClient, MockStep, MockStepKind};

//! Deterministic mock LLM client for engine tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, sleep};

use crate::error::{CoreError, Result};
use reverie_models::{ContentBlock, Role};

use super::{CompletionRequest, CompletionResponse, LlmClient};

/// Deterministic step for scripted mock completions.
#[derive(Debug, Clone)]
pub enum MockStepKind {
    /// Return a plain assistant message.
    Text(String),
    /// Return arbitrary content blocks.
    Blocks(Vec<ContentBlock>),
    /// Return an LLM error.
    Error(String),
    /// Return a timeout-like error after optional delay.
    Timeout,
}

/// Scripted completion step with optional delay.
#[derive(Debug, Clone)]
pub struct MockStep {
    pub delay_ms: u64,
    pub kind: MockStepKind,
}

impl MockStep {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Text(content.into()),
        }
    }

    pub fn blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Blocks(blocks),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            delay_ms: 0,
            kind: MockStepKind::Error(message.into()),
        }
    }

    pub fn timeout(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            kind: MockStepKind::Timeout,
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// A deterministic mock LLM client driven by scripted steps.
///
/// When the script runs out, completions echo the last user message, which
/// keeps long conversation tests from needing one step per turn.
#[derive(Debug, Clone, Default)]
pub struct MockLlmClient {
    model: String,
    script: Arc<Mutex<VecDeque<MockStep>>>,
}

impl MockLlmClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn from_steps(model: impl Into<String>, steps: Vec<MockStep>) -> Self {
        Self {
            model: model.into(),
            script: Arc::new(Mutex::new(VecDeque::from(steps))),
        }
    }

    pub async fn push_step(&self, step: MockStep) {
        self.script.lock().await.push_back(step);
    }

    async fn next_step(&self) -> Option<MockStep> {
        self.script.lock().await.pop_front()
    }

    fn fallback_response(request: &CompletionRequest) -> CompletionResponse {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|msg| matches!(msg.role, Role::User))
            .map(|msg| format!("mock-echo: {}", msg.visible_text()))
            .unwrap_or_else(|| "mock-ok".to_string());

        CompletionResponse::from_text(text)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let step = self.next_step().await;
        let Some(step) = step else {
            return Ok(Self::fallback_response(&request));
        };

        if step.delay_ms > 0 {
            sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match step.kind {
            MockStepKind::Text(content) => Ok(CompletionResponse::from_text(content)),
            MockStepKind::Blocks(blocks) => Ok(CompletionResponse { blocks }),
            MockStepKind::Error(message) => Err(CoreError::Llm(message)),
            MockStepKind::Timeout => Err(CoreError::Llm("mock timeout".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_models::Message;

    #[tokio::test]
    async fn mock_client_returns_scripted_text() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("hello")]);

        let response = client
            .complete(CompletionRequest::new(vec![Message::user("ping")]))
            .await
            .expect("mock response should succeed");

        assert_eq!(response.text(), "hello");
    }

    #[tokio::test]
    async fn mock_client_falls_back_to_echo() {
        let client = MockLlmClient::new("mock-model");

        let response = client
            .complete(CompletionRequest::new(vec![Message::user("ping")]))
            .await
            .expect("fallback should succeed");

        assert_eq!(response.text(), "mock-echo: ping");
    }

    #[tokio::test]
    async fn mock_client_returns_scripted_error() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::error("boom")]);

        let result = client
            .complete(CompletionRequest::new(vec![Message::user("ping")]))
            .await;

        assert!(matches!(result, Err(CoreError::Llm(msg)) if msg == "boom"));
    }
}

//! Prompt helpers for the memory subsystems.

use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient};
use reverie_models::Message;

const SUMMARY_MAX_TOKENS: u32 = 500;
const EXTRACTION_MAX_TOKENS: u32 = 1000;

/// Summarize a role-tagged conversation transcript.
///
/// Returns whatever the model produced; callers treat an empty string as a
/// failed summarization.
pub async fn summarize_conversation(llm: &dyn LlmClient, conversation: &str) -> Result<String> {
    let prompt = format!(
        "Summarize the following conversation concisely. Preserve key facts, \
         decisions, names, and emotional tone. Reply with the summary only.\n\n{}",
        conversation
    );

    let request =
        CompletionRequest::new(vec![Message::user(prompt)]).with_max_tokens(SUMMARY_MAX_TOKENS);
    let response = llm.complete(request).await?;
    Ok(response.text())
}

/// Condense a list of memory contents into one overall summary.
pub async fn summarize_memories(llm: &dyn LlmClient, contents: &str) -> Result<String> {
    let prompt = format!(
        "The following are memories accumulated over time. Write a short \
         overall summary of what they add up to, in a few sentences.\n\n{}",
        contents
    );

    let request =
        CompletionRequest::new(vec![Message::user(prompt)]).with_max_tokens(SUMMARY_MAX_TOKENS);
    let response = llm.complete(request).await?;
    Ok(response.text())
}

/// Ask the model to extract memorable facts from a transcript as JSON.
///
/// The raw text is returned untrusted; the caller parses it against a strict
/// schema and drops anything that fails validation.
pub async fn extract_memories_json(llm: &dyn LlmClient, transcript: &str) -> Result<String> {
    let prompt = format!(
        "Extract facts worth remembering long-term from this conversation. \
         Respond with JSON only, in the form:\n\
         {{\"memories\": [{{\"content\": \"...\", \"type\": \"episode|semantic|emotion\", \
         \"importance\": 0.0, \"keywords\": [\"...\"]}}]}}\n\
         Return {{\"memories\": []}} if nothing is worth keeping.\n\n{}",
        transcript
    );

    let request =
        CompletionRequest::new(vec![Message::user(prompt)]).with_max_tokens(EXTRACTION_MAX_TOKENS);
    let response = llm.complete(request).await?;
    Ok(response.text())
}

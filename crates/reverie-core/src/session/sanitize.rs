//! Conversation state sanitizer and size bounder.
//!
//! State that crosses a process boundary (client payloads, the external
//! store) passes through here: untrusted content is truncated and stripped
//! of heavy payloads, then the whole state is forced under a byte budget by
//! a staircase of increasingly aggressive cuts. Sanitization is idempotent.

use serde_json::Value;

use reverie_models::{ContentBlock, ConversationState, Message, MessageContent};

/// Floor for the effective byte budget; a configured budget below this is
/// treated as a configuration error.
const MIN_STATE_BYTES: usize = 20_000;

const MAX_RECENT_MESSAGES: usize = 120;
const MAX_BLOCKS_PER_MESSAGE: usize = 16;
const MAX_TEXT_CHARS: usize = 1800;
const MAX_ID_CHARS: usize = 120;
const MAX_COMPRESSED_CHARS: usize = 24_000;
const MAX_JSON_DEPTH: usize = 4;
const MAX_JSON_FANOUT: usize = 16;
const MAX_JSON_STRING_CHARS: usize = 600;
const MAX_JSON_OTHER_CHARS: usize = 300;

const TRUNCATION_MARKER: &str = "...[truncated]";
const IMAGE_PLACEHOLDER: &str = "[Image attached by user]";

/// Sanitize and size-bound a conversation state snapshot.
pub fn sanitize_state(
    session_id: impl Into<String>,
    short_term: &[Message],
    compressed_context: &str,
    max_state_bytes: usize,
    updated_at: i64,
) -> ConversationState {
    let start = short_term.len().saturating_sub(MAX_RECENT_MESSAGES);
    let sanitized: Vec<Message> = short_term[start..].iter().map(sanitize_message).collect();
    let compressed = truncate_text(compressed_context, MAX_COMPRESSED_CHARS);

    let max_bytes = max_state_bytes.max(MIN_STATE_BYTES);
    let (short_term, compressed_context) = fit_state_size(sanitized, compressed, max_bytes);

    ConversationState {
        session_id: session_id.into(),
        short_term,
        compressed_context,
        updated_at,
    }
}

/// UTF-8 byte size of the encoded state payload; the unit every byte budget
/// is measured in.
pub fn estimate_state_size(short_term: &[Message], compressed_context: &str) -> usize {
    let payload = ConversationState {
        session_id: String::new(),
        short_term: short_term.to_vec(),
        compressed_context: compressed_context.to_string(),
        updated_at: 0,
    };
    payload.encoded_size()
}

/// Truncate on a char boundary, appending a marker when anything was cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// The descending staircase: drop oldest eighths while more than 8 messages
/// remain, then cut the compressed context to 8000 chars, then drop
/// messages one at a time down to 2, then fall back to the last 8 messages
/// with a 2000-char context.
fn fit_state_size(
    mut short_term: Vec<Message>,
    mut compressed_context: String,
    max_bytes: usize,
) -> (Vec<Message>, String) {
    while estimate_state_size(&short_term, &compressed_context) > max_bytes
        && short_term.len() > 8
    {
        let drop = (short_term.len() / 8).max(1);
        short_term.drain(..drop);
    }

    if estimate_state_size(&short_term, &compressed_context) > max_bytes {
        compressed_context = truncate_text(&compressed_context, 8000);
    }

    while estimate_state_size(&short_term, &compressed_context) > max_bytes
        && short_term.len() > 2
    {
        short_term.remove(0);
    }

    if estimate_state_size(&short_term, &compressed_context) > max_bytes {
        let keep_from = short_term.len().saturating_sub(8);
        short_term.drain(..keep_from);
        compressed_context = truncate_text(&compressed_context, 2000);
    }

    (short_term, compressed_context)
}

fn sanitize_message(message: &Message) -> Message {
    let content = match &message.content {
        MessageContent::Text(text) => MessageContent::Text(truncate_text(text, MAX_TEXT_CHARS)),
        MessageContent::Blocks(blocks) => {
            let clean: Vec<ContentBlock> = blocks
                .iter()
                .take(MAX_BLOCKS_PER_MESSAGE)
                .map(sanitize_block)
                .collect();
            if clean.is_empty() {
                MessageContent::Text(String::new())
            } else {
                MessageContent::Blocks(clean)
            }
        }
    };

    Message {
        role: message.role,
        content,
    }
}

fn sanitize_block(block: &ContentBlock) -> ContentBlock {
    match block {
        ContentBlock::Text { text } => ContentBlock::Text {
            text: truncate_text(text, MAX_TEXT_CHARS),
        },
        // Binary payloads never survive a snapshot.
        ContentBlock::Image { .. } => ContentBlock::Text {
            text: IMAGE_PLACEHOLDER.to_string(),
        },
        ContentBlock::ToolUse { id, name, input } => ContentBlock::ToolUse {
            id: truncate_text(id, MAX_ID_CHARS),
            name: truncate_text(name, MAX_ID_CHARS),
            input: sanitize_json_value(input, 0),
        },
        ContentBlock::ToolResult {
            tool_use_id,
            content,
        } => {
            let content_text = match content {
                Value::String(text) => text.clone(),
                other => sanitize_json_value(other, 0).to_string(),
            };
            ContentBlock::ToolResult {
                tool_use_id: truncate_text(tool_use_id, MAX_ID_CHARS),
                content: Value::String(truncate_text(&content_text, MAX_TEXT_CHARS)),
            }
        }
    }
}

fn sanitize_json_value(value: &Value, depth: usize) -> Value {
    if depth > MAX_JSON_DEPTH {
        return Value::String(truncate_text(&value.to_string(), MAX_JSON_OTHER_CHARS));
    }

    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(text) => Value::String(truncate_text(text, MAX_JSON_STRING_CHARS)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .take(MAX_JSON_FANOUT)
                .map(|item| sanitize_json_value(item, depth + 1))
                .collect(),
        ),
        Value::Object(entries) => {
            let mut result = serde_json::Map::new();
            for (key, item) in entries.iter().take(MAX_JSON_FANOUT) {
                result.insert(
                    truncate_text(key, MAX_ID_CHARS),
                    sanitize_json_value(item, depth + 1),
                );
            }
            Value::Object(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_models::Role;
    use serde_json::json;

    fn sanitize_default(short_term: &[Message], compressed: &str) -> ConversationState {
        sanitize_state("s", short_term, compressed, 140_000, 0)
    }

    #[test]
    fn truncate_appends_marker_only_when_cut() {
        assert_eq!(truncate_text("short", 10), "short");
        let cut = truncate_text(&"x".repeat(20), 10);
        assert_eq!(cut, format!("{}{}", "x".repeat(10), TRUNCATION_MARKER));
    }

    #[test]
    fn truncate_is_char_boundary_safe() {
        let text = "日本語のテキストです".repeat(10);
        let cut = truncate_text(&text, 7);
        assert_eq!(cut.chars().count(), 7 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn only_recent_messages_survive() {
        let messages: Vec<Message> = (0..150).map(|i| Message::user(format!("m{i}"))).collect();
        let state = sanitize_default(&messages, "");
        assert_eq!(state.short_term.len(), 120);
        assert_eq!(state.short_term[0].visible_text(), "m30");
    }

    #[test]
    fn long_text_content_is_truncated() {
        let state = sanitize_default(&[Message::user("a".repeat(5000))], "");
        let text = state.short_term[0].visible_text();
        assert!(text.ends_with(TRUNCATION_MARKER));
        assert_eq!(text.chars().count(), 1800 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn image_blocks_become_placeholder_text() {
        let msg = Message::user_blocks(vec![ContentBlock::Image {
            media_type: "image/png".into(),
            data: "A".repeat(100_000),
        }]);
        let state = sanitize_default(&[msg], "");
        assert_eq!(
            state.short_term[0].content,
            MessageContent::Blocks(vec![ContentBlock::Text {
                text: IMAGE_PLACEHOLDER.into()
            }])
        );
    }

    #[test]
    fn block_count_is_capped_at_sixteen() {
        let blocks: Vec<ContentBlock> = (0..40)
            .map(|i| ContentBlock::Text {
                text: format!("b{i}"),
            })
            .collect();
        let state = sanitize_default(&[Message::assistant_blocks(blocks)], "");
        let MessageContent::Blocks(clean) = &state.short_term[0].content else {
            panic!("expected blocks");
        };
        assert_eq!(clean.len(), 16);
    }

    #[test]
    fn tool_use_input_is_json_sanitized() {
        let deep = json!({"a": {"b": {"c": {"d": {"e": {"f": "too deep"}}}}}});
        let big_list: Vec<i32> = (0..50).collect();
        let msg = Message::assistant_blocks(vec![ContentBlock::ToolUse {
            id: "i".repeat(500),
            name: "search".into(),
            input: json!({"deep": deep, "list": big_list, "text": "y".repeat(2000)}),
        }]);

        let state = sanitize_default(&[msg], "");
        let MessageContent::Blocks(blocks) = &state.short_term[0].content else {
            panic!("expected blocks");
        };
        let ContentBlock::ToolUse { id, input, .. } = &blocks[0] else {
            panic!("expected tool_use");
        };
        assert!(id.ends_with(TRUNCATION_MARKER));
        assert_eq!(input["list"].as_array().unwrap().len(), 16);
        assert!(
            input["text"]
                .as_str()
                .unwrap()
                .ends_with(TRUNCATION_MARKER)
        );
        // depth 5 collapses to a truncated string
        assert!(input["deep"]["a"]["b"]["c"]["d"].is_string());
    }

    #[test]
    fn tool_result_content_collapses_to_string() {
        let msg = Message::user_blocks(vec![ContentBlock::ToolResult {
            tool_use_id: "toolu_1".into(),
            content: json!({"rows": ["a", "b"], "count": 2}),
        }]);
        let state = sanitize_default(&[msg], "");
        let MessageContent::Blocks(blocks) = &state.short_term[0].content else {
            panic!("expected blocks");
        };
        let ContentBlock::ToolResult { content, .. } = &blocks[0] else {
            panic!("expected tool_result");
        };
        assert!(content.is_string());
    }

    #[test]
    fn compressed_context_is_capped() {
        let state = sanitize_default(&[], &"c".repeat(30_000));
        assert!(state.compressed_context.chars().count() <= 24_000 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn output_fits_budget() {
        // 120 messages of ~1800 chars exceed even the default budget.
        let messages: Vec<Message> =
            (0..120).map(|_| Message::user("z".repeat(1800))).collect();
        let state = sanitize_state("s", &messages, &"c".repeat(24_000), 140_000, 0);
        assert!(estimate_state_size(&state.short_term, &state.compressed_context) <= 140_000);
    }

    #[test]
    fn budget_floor_is_twenty_kb() {
        let messages: Vec<Message> = (0..40).map(|_| Message::user("z".repeat(1000))).collect();
        let state = sanitize_state("s", &messages, "", 1, 0);
        assert!(estimate_state_size(&state.short_term, &state.compressed_context) <= 20_000);
        // a handful of messages survive even under the tiny configured budget
        assert!(state.short_term.len() >= 2);
    }

    #[test]
    fn sanitize_is_idempotent() {
        let messages = vec![
            Message::user("a".repeat(4000)),
            Message::user_blocks(vec![
                ContentBlock::Image {
                    media_type: "image/jpeg".into(),
                    data: "D".repeat(10_000),
                },
                ContentBlock::ToolUse {
                    id: "toolu_long_".repeat(30),
                    name: "n".into(),
                    input: json!({"s": "v".repeat(5000), "nested": {"x": [1, 2, 3]}}),
                },
                ContentBlock::ToolResult {
                    tool_use_id: "toolu_1".into(),
                    content: json!({"big": "w".repeat(9000)}),
                },
            ]),
            Message::assistant("done"),
        ];
        let once = sanitize_state("s", &messages, &"c".repeat(30_000), 140_000, 7);
        let twice = sanitize_state(
            "s",
            &once.short_term,
            &once.compressed_context,
            140_000,
            7,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn roles_are_preserved() {
        let state = sanitize_default(&[Message::assistant("hi"), Message::user("yo")], "");
        assert_eq!(state.short_term[0].role, Role::Assistant);
        assert_eq!(state.short_term[1].role, Role::User);
    }
}

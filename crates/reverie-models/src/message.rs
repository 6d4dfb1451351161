use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation roles. The buffer only ever holds user and assistant turns;
/// anything else is rejected at the serde boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

/// Message content is either a plain string or a list of typed blocks,
/// mirroring the Anthropic messages payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        media_type: String,
        data: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Blocks(blocks),
        }
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        }
    }

    /// Concatenated text parts of the message, ignoring non-text blocks.
    pub fn visible_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|block| match block {
                        ContentBlock::Text { text } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                parts.join("\n")
            }
        }
    }

    /// Whether any block is a tool_result (a tool exchange in progress).
    pub fn has_tool_result(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .any(|block| matches!(block, ContentBlock::ToolResult { .. })),
        }
    }

    /// Ids of tool_use blocks carried by this message.
    pub fn tool_use_ids(&self) -> Vec<&str> {
        match &self.content {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_content_serializes_as_plain_string() {
        let msg = Message::user("hello");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn blocks_round_trip_through_tagged_json() {
        let msg = Message::assistant_blocks(vec![
            ContentBlock::Text {
                text: "looking that up".into(),
            },
            ContentBlock::ToolUse {
                id: "toolu_01".into(),
                name: "search".into(),
                input: json!({"query": "weather"}),
            },
        ]);
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.tool_use_ids(), vec!["toolu_01"]);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let raw = json!({"role": "system", "content": "be nice"});
        assert!(serde_json::from_value::<Message>(raw).is_err());
    }

    #[test]
    fn visible_text_skips_non_text_blocks() {
        let msg = Message::user_blocks(vec![
            ContentBlock::Image {
                media_type: "image/png".into(),
                data: "aGk=".into(),
            },
            ContentBlock::Text { text: "see above".into() },
        ]);
        assert_eq!(msg.visible_text(), "see above");
    }
}

//! Conversation message types shared by every chat-model request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Role of a message's author in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    Human,
    Assistant,
    Tool,
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool call this message is a result for, if `role == Tool`.
    pub tool_call_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            metadata: HashMap::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_call_id: Some(tool_call_id.into()),
            metadata: HashMap::new(),
        }
    }

    /// Rough size estimate used by the context trimmer before a real token
    /// count is available (see `context::token_counter`).
    pub fn approx_chars(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_expected_role() {
        assert_eq!(Message::system("hi").role, MessageRole::System);
        assert_eq!(Message::human("hi").role, MessageRole::Human);
        assert_eq!(Message::assistant("hi").role, MessageRole::Assistant);
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call-1", "{}");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(msg.role, MessageRole::Tool);
    }
}

//! The `ChatModel` trait: the boundary every LLM subsystem (conversation,
//! decomposition, executor) talks through.

use crate::error::Result;
use crate::request::{ChatRequest, ChatResponse};
use async_trait::async_trait;

/// Minimal, provider-agnostic interface to a chat-completion model.
///
/// Implementations must be `Send + Sync` so they can be shared behind
/// `Arc<dyn ChatModel>` across the conversation, decomposition, and executor
/// subsystems, each of which is wired to its own instance (spec §6).
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete chat response from messages.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Check if the model/provider is reachable. Default assumes it is.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Name reported in logs and `Job.stats`/metadata, e.g. `"gpt-4o-mini"`.
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Message, MessageRole};
    use std::sync::Arc;

    #[derive(Clone)]
    struct MockModel {
        reply: String,
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::new(Message::assistant(self.reply.clone())))
        }

        fn model_name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn trait_object_can_be_shared() {
        let model: Arc<dyn ChatModel> = Arc::new(MockModel {
            reply: "hello".to_string(),
        });

        let response = model
            .chat(ChatRequest::new(vec![Message::human("hi")]))
            .await
            .unwrap();

        assert_eq!(response.message.role, MessageRole::Assistant);
        assert_eq!(response.message.content, "hello");
    }
}

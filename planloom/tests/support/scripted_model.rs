//! A `ChatModel` that replays a fixed script of responses, for deterministic
//! decomposer/executor tests with no network calls.

use async_trait::async_trait;
use planloom_llm::{ChatModel, ChatRequest, ChatResponse, LlmError, Message, Result as LlmResult};
use tokio::sync::Mutex;

#[allow(dead_code)]
pub enum Scripted {
    Reply(String),
    Fail(String),
}

#[allow(dead_code)]
pub struct ScriptedModel {
    script: Vec<Scripted>,
    cursor: Mutex<usize>,
}

#[allow(dead_code)]
impl ScriptedModel {
    /// Replays `replies` in order, then repeats the final entry forever.
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            script: replies.into_iter().map(|r| Scripted::Reply(r.to_string())).collect(),
            cursor: Mutex::new(0),
        }
    }

    pub fn with_script(script: Vec<Scripted>) -> Self {
        Self { script, cursor: Mutex::new(0) }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, _request: ChatRequest) -> LlmResult<ChatResponse> {
        let mut cursor = self.cursor.lock().await;
        let idx = (*cursor).min(self.script.len() - 1);
        *cursor += 1;
        match &self.script[idx] {
            Scripted::Reply(content) => Ok(ChatResponse::new(Message::assistant(content.clone()))),
            Scripted::Fail(message) => Err(LlmError::ServiceUnavailable(message.clone())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted-test-model"
    }
}

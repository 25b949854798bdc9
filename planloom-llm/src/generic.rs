//! Generic OpenAI-compatible chat-completion client.
//!
//! planloom does not ship per-vendor clients (Claude, Gemini, Grok, ...); the
//! environment configuration table in spec §6 only names `api_url`/`api_key`/
//! `model`, so one client speaking the widely-adopted `/chat/completions`
//! wire format covers OpenAI, Ollama, vLLM, and any other compatible gateway.

use crate::config::LlmConfig;
use crate::error::{LlmError, Result};
use crate::message::{Message, MessageRole};
use crate::request::{ChatRequest, ChatResponse, UsageMetadata};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::ChatModel;

/// A `ChatModel` that speaks the OpenAI `/chat/completions` wire format.
#[derive(Clone)]
pub struct GenericChatModel {
    config: LlmConfig,
    http: Client,
}

impl GenericChatModel {
    pub fn new(config: LlmConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build reqwest client");

        Self { config, http }
    }

    fn to_wire_role(role: MessageRole) -> &'static str {
        match role {
            MessageRole::System => "system",
            MessageRole::Human => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    fn convert_message(msg: &Message) -> WireMessage {
        WireMessage {
            role: Self::to_wire_role(msg.role).to_string(),
            content: Some(msg.content.clone()),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for GenericChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));

        let messages: Vec<WireMessage> = request.messages.iter().map(Self::convert_message).collect();

        let body = WireRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.config.temperature,
            max_tokens: request.config.max_tokens,
            stop: if request.config.stop_sequences.is_empty() {
                None
            } else {
                Some(request.config.stop_sequences.clone())
            },
            stream: false,
        };

        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationError(text),
                404 => LlmError::ModelNotFound(self.config.model.clone()),
                429 => LlmError::RateLimitExceeded(text),
                s if s >= 500 => LlmError::ServiceUnavailable(text),
                _ => LlmError::ProviderError(format!("{status}: {text}")),
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        let message = Message::assistant(choice.message.content.unwrap_or_default());
        let usage = wire.usage.map(|u| UsageMetadata {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ChatResponse {
            message,
            usage,
            metadata: Default::default(),
        })
    }

    async fn is_available(&self) -> Result<bool> {
        let url = format!("{}/models", self.config.api_url.trim_end_matches('/'));
        let mut req = self.http.get(&url);
        if let Some(key) = &self.config.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        match req.send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_construction_does_not_panic() {
        let config = LlmConfig::new("openai-compatible", "gpt-4o-mini", "https://api.example.com/v1");
        let _client = GenericChatModel::new(config);
    }

    #[test]
    fn message_conversion_maps_roles() {
        let wire = GenericChatModel::convert_message(&Message::human("hi"));
        assert_eq!(wire.role, "user");
        assert_eq!(wire.content.as_deref(), Some("hi"));
    }
}

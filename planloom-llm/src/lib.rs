//! The external LLM-provider boundary used by every planloom subsystem that
//! talks to a chat model: conversation, decomposition, and execution.
//!
//! `planloom-llm` provides a provider-agnostic [`ChatModel`] trait and one
//! concrete implementation, [`GenericChatModel`], speaking the widely-adopted
//! OpenAI `/chat/completions` wire format. Each subsystem builds its own
//! client from its own [`LlmConfig`] (spec §6), so decomposition or execution
//! can point at a cheaper or more deterministic model than conversation.
//!
//! # Example
//!
//! ```rust,ignore
//! use planloom_llm::{ChatModel, ChatRequest, LlmConfig, Message};
//! use planloom_llm::generic::GenericChatModel;
//!
//! let config = LlmConfig::from_env_prefix("CONVO")?;
//! let client = GenericChatModel::new(config);
//!
//! let request = ChatRequest::new(vec![Message::human("What is Rust?")]);
//! let response = client.chat(request).await?;
//! println!("{}", response.message.content);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod generic;
pub mod message;
pub mod request;

pub use client::ChatModel;
pub use config::LlmConfig;
pub use error::{LlmError, Result};
pub use generic::GenericChatModel;
pub use message::{Message, MessageRole};
pub use request::{ChatConfig, ChatRequest, ChatResponse, UsageMetadata};

//! Structured Action Agent (C6, spec §4.6): turns one chat message into a
//! structured LLM reply, validates and dispatches its actions against the
//! plan repository, job manager, and session store, and assembles the
//! response the API layer returns to the client.

pub mod catalog;
pub mod dispatch;
pub mod error;
pub mod prompt;
pub mod schema;
pub mod tools;

pub use dispatch::{handle_turn, AgentConfig, AgentDeps, ChatTurnMetadata, ChatTurnResponse};
pub use error::{AgentError, AgentResult};
pub use schema::{Action, ActionKind, AgentStep, LlmStructuredResponse};
pub use tools::{NullToolInvoker, ToolError, ToolInvoker, ToolResult};

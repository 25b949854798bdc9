//! planloom — a conversational planning and execution orchestrator.
//!
//! The crate is organized around the subsystems in the design: a Structured
//! Action Agent that turns chat turns into plan actions, a Plan Repository
//! storing plan trees across a main registry and per-plan SQLite files, a
//! BFS Plan Decomposer that expands tasks into subtrees, a Job Manager that
//! runs and streams background work, and a thin Session Store for chat
//! history.

pub mod agent;
pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod decomposer;
pub mod executor;
pub mod jobs;
pub mod plan;
pub mod session;
pub mod version;

pub use agent::{handle_turn, AgentConfig, AgentDeps, ChatTurnResponse};
pub use config::AppConfig;
pub use plan::{PlanError, PlanNode, PlanNodeStatus, PlanRepository, PlanResult, PlanTree};

//! Shared Axum application state.

use crate::agent::{AgentConfig, AgentDeps};

/// Everything a handler needs: the turn-dispatch dependencies plus the
/// agent's tuning knobs (history limit, auto-decompose, outline size).
#[derive(Clone)]
pub struct AppState {
    pub deps: AgentDeps,
    pub config: AgentConfig,
}

impl AppState {
    pub fn new(deps: AgentDeps, config: AgentConfig) -> Self {
        Self { deps, config }
    }
}

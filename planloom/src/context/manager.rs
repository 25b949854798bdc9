//! Per-model context window limits, shared by the conversation turn's
//! history trimming (`agent::dispatch`) and the executor's per-task prompt
//! assembly.

/// Context window limits for different models
#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    /// Maximum tokens for the model
    pub max_tokens: usize,
    /// Reserved tokens for system prompt
    pub system_reserved: usize,
    /// Reserved tokens for response
    pub response_reserved: usize,
}

impl ContextLimits {
    /// Create context limits for a specific model
    pub fn for_model(model: &str) -> Self {
        let max_tokens = if model.contains("gpt-4-turbo") || model.contains("gpt-4-32k") {
            128000
        } else if model.contains("gpt-4") {
            8192
        } else if model.contains("gpt-3.5-turbo-16k") {
            16384
        } else if model.contains("gpt-3.5") {
            4096
        } else if model.contains("claude-3") {
            200000
        } else if model.contains("claude-2") {
            100000
        } else if model.contains("claude") {
            9000
        } else {
            // Default conservative limit
            4096
        };

        Self {
            max_tokens,
            system_reserved: 500,
            response_reserved: 1000,
        }
    }

    /// Get available tokens for conversation history
    pub fn available_for_history(&self) -> usize {
        self.max_tokens
            .saturating_sub(self.system_reserved)
            .saturating_sub(self.response_reserved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_limits() {
        let limits = ContextLimits::for_model("gpt-4");
        assert_eq!(limits.max_tokens, 8192);

        let claude_limits = ContextLimits::for_model("claude-3");
        assert_eq!(claude_limits.max_tokens, 200000);
    }

    #[test]
    fn available_for_history_reserves_system_and_response_budget() {
        let limits = ContextLimits::for_model("gpt-3.5");
        assert_eq!(limits.available_for_history(), 4096 - 500 - 1000);
    }
}

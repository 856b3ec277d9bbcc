//! Configuration for the [`Harness`](super::harness::Harness).
//!
//! ```ignore
//! let config = HarnessConfig::new("o4-mini-2025-04-16")
//!     .with_agent_name("Processor")
//!     .with_max_rounds(20)
//!     .with_reasoning_effort(ReasoningEffort::Medium)
//!     .with_retries(2);
//! ```

use crate::ReasoningEffort;
use crate::api::retry::RetryConfig;

/// Default cap on model/tool round-trips per run.
pub const DEFAULT_MAX_TURNS: u32 = 20;

/// Configuration for a [`Harness`](super::harness::Harness) run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Model identifier (e.g. `"o4-mini-2025-04-16"`).
    pub model: String,
    /// Display name of the agent, reported in `AgentStarted`.
    pub agent_name: String,
    /// Maximum tool-use round-trips before the run fails.
    pub max_rounds: u32,
    /// Maximum completion tokens per response. `None` leaves it to the API.
    pub max_tokens: Option<u32>,
    /// Reasoning effort for o-series models. Other models reject it, so it
    /// is unset by default.
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Retry configuration for transient API failures.
    pub retry: RetryConfig,
    /// Whether to stream completions (emits `TextDelta` events).
    pub streaming: bool,
    /// Run same-turn tool calls one at a time instead of concurrently.
    pub sequential_tools: bool,
}

impl HarnessConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    /// Enable automatic retries for transient API failures (429, 5xx,
    /// network errors). Pass `0` to disable retries (the default).
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(max_retries);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_sequential_tools(mut self, sequential: bool) -> Self {
        self.sequential_tools = sequential;
        self
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            model: crate::DEFAULT_MODEL.to_string(),
            agent_name: "Agent".to_string(),
            max_rounds: DEFAULT_MAX_TURNS,
            max_tokens: None,
            reasoning_effort: None,
            retry: RetryConfig::default(),
            streaming: true,
            sequential_tools: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.model, "o4-mini-2025-04-16");
        assert_eq!(config.max_rounds, 20);
        assert!(config.streaming);
        assert!(!config.sequential_tools);
        assert!(config.reasoning_effort.is_none());
        assert!(config.max_tokens.is_none());
        assert_eq!(config.retry.max_retries, 0);
    }

    #[test]
    fn builder_methods() {
        let config = HarnessConfig::new("gpt-4.1-mini-2025-04-14")
            .with_agent_name("Processor")
            .with_max_rounds(5)
            .with_max_tokens(2048)
            .with_reasoning_effort(ReasoningEffort::Low)
            .with_retries(3)
            .with_streaming(false)
            .with_sequential_tools(true);
        assert_eq!(config.model, "gpt-4.1-mini-2025-04-14");
        assert_eq!(config.agent_name, "Processor");
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.reasoning_effort, Some(ReasoningEffort::Low));
        assert_eq!(config.retry.max_retries, 3);
        assert!(!config.streaming);
        assert!(config.sequential_tools);
    }
}

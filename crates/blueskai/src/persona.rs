//! Builds the persona agent from a profile.

use blueskai_rs::agent::Agent;
use blueskai_rs::ReasoningEffort;
use blueskai_rs::mcp::McpServerStdio;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Display name of every persona agent.
pub const AGENT_NAME: &str = "Blueskai Processor";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PersonaError {
    #[error("unsupported model '{0}' (expected one of gpt-4.1-nano-2025-04-14, gpt-4.1-mini-2025-04-14, o4-mini-2025-04-16)")]
    UnsupportedModel(String),
}

/// Models the persona agent may run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Model {
    #[value(name = "gpt-4.1-nano-2025-04-14")]
    Gpt41Nano,
    #[value(name = "gpt-4.1-mini-2025-04-14")]
    Gpt41Mini,
    #[default]
    #[value(name = "o4-mini-2025-04-16")]
    O4Mini,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Gpt41Nano, Model::Gpt41Mini, Model::O4Mini];

    pub fn id(self) -> &'static str {
        match self {
            Model::Gpt41Nano => "gpt-4.1-nano-2025-04-14",
            Model::Gpt41Mini => "gpt-4.1-mini-2025-04-14",
            Model::O4Mini => "o4-mini-2025-04-16",
        }
    }

    /// Whether the model takes a reasoning effort.
    pub fn is_reasoning(self) -> bool {
        matches!(self, Model::O4Mini)
    }
}

/// How hard a reasoning model thinks before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl From<Effort> for ReasoningEffort {
    fn from(effort: Effort) -> Self {
        match effort {
            Effort::Low => ReasoningEffort::Low,
            Effort::Medium => ReasoningEffort::Medium,
            Effort::High => ReasoningEffort::High,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Model {
    type Err = PersonaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|model| model.id() == s)
            .ok_or_else(|| PersonaError::UnsupportedModel(s.to_string()))
    }
}

/// System prompt that puts the model in the persona's shoes.
pub fn persona_instructions(profile: &str) -> String {
    format!("You act entirely as the person indicated in the following profile:\n{profile}")
}

/// Combine persona text, model and tool servers into the run's agent.
///
/// Fails before anything touches the network when `model` is not one of
/// [`Model::ALL`].
pub fn build_agent(
    profile: &str,
    model: &str,
    servers: Vec<McpServerStdio>,
) -> Result<Agent, PersonaError> {
    let model: Model = model.parse()?;
    Ok(Agent::new(AGENT_NAME, persona_instructions(profile), model.id()).with_mcp_servers(servers))
}

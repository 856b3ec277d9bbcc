use crate::mcp::McpServerStdio;

/// An agent definition: who the model acts as, which model runs it and which
/// tool servers it may call. Built once per run and never mutated.
#[derive(Debug, Clone)]
pub struct Agent {
    name: String,
    instructions: String,
    model: String,
    mcp_servers: Vec<McpServerStdio>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: model.into(),
            mcp_servers: Vec::new(),
        }
    }

    /// Attach tool servers. Their tools are offered to the model in the
    /// order given.
    pub fn with_mcp_servers(mut self, servers: Vec<McpServerStdio>) -> Self {
        self.mcp_servers = servers;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The system prompt.
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn mcp_servers(&self) -> &[McpServerStdio] {
        &self.mcp_servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let agent = Agent::new("Processor", "You are Alice.", "gpt-4.1-nano-2025-04-14");
        assert_eq!(agent.name(), "Processor");
        assert_eq!(agent.instructions(), "You are Alice.");
        assert_eq!(agent.model(), "gpt-4.1-nano-2025-04-14");
        assert!(agent.mcp_servers().is_empty());
    }
}

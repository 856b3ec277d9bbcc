//! Run orchestration: hand a persona agent and a prompt to the completion
//! engine, render the stream and boil the outcome down to a [`RunResult`].
//!
//! Failures anywhere in a run (unsupported model, API errors, the turn
//! limit, the external timeout) end up in the result. Nothing escapes
//! [`Runner::process_instruction`] or [`Runner::run_agent`].

use crate::persona::build_agent;
use crate::prompt::Prompt;
use blueskai_rs::agent::{
    Agent, CompletionEngine, DEFAULT_MAX_TURNS, LogSink, RenderSink, classify,
};
use blueskai_rs::mcp::McpServerStdio;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace};

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub success: bool,
    pub error: Option<String>,
}

impl RunResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

pub struct Runner {
    engine: Arc<dyn CompletionEngine>,
    model: String,
    max_turns: u32,
    timeout: Option<Duration>,
    sink: Box<dyn RenderSink>,
}

impl Runner {
    pub fn new(engine: Arc<dyn CompletionEngine>, model: impl Into<String>) -> Self {
        Self {
            engine,
            model: model.into(),
            max_turns: DEFAULT_MAX_TURNS,
            timeout: None,
            sink: Box::new(LogSink),
        }
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Abort the run once it has been going for `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sink(mut self, sink: impl RenderSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the persona agent, compose the prompt and run it.
    pub async fn process_instruction(
        &self,
        profile: &str,
        instruction: &str,
        servers: Vec<McpServerStdio>,
    ) -> RunResult {
        let agent = match build_agent(profile, &self.model, servers) {
            Ok(agent) => agent,
            Err(e) => return report(Err(e.to_string())),
        };
        if instruction.trim().is_empty() {
            return report(Err("instruction is empty".to_string()));
        }
        let prompt = Prompt::now(instruction);
        self.run_agent(&agent, prompt.as_str()).await
    }

    /// Run `agent` on `prompt`, consuming the event stream to its end.
    pub async fn run_agent(&self, agent: &Agent, prompt: &str) -> RunResult {
        info!(
            "Processing instruction with agent using model: {}",
            agent.model()
        );
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drive(agent, prompt))
                .await
                .unwrap_or_else(|_| Err(format!("run timed out after {limit:?}"))),
            None => self.drive(agent, prompt).await,
        };
        report(outcome)
    }

    async fn drive(&self, agent: &Agent, prompt: &str) -> Result<(), String> {
        if prompt.trim().is_empty() {
            return Err("prompt is empty".to_string());
        }
        let mut stream = self.engine.run_streamed(agent, prompt, self.max_turns);
        while let Some(event) = stream.next().await {
            let event = event?;
            match classify(&event) {
                Some(rendered) => self.sink.render(&rendered),
                None => trace!("ignoring stream event: {event:?}"),
            }
        }
        Ok(())
    }
}

/// Log the terminal state and turn it into a [`RunResult`].
pub fn report(outcome: Result<(), String>) -> RunResult {
    match outcome {
        Ok(()) => {
            info!("Instruction processed successfully.");
            RunResult::succeeded()
        }
        Err(e) => {
            error!("Error: {e}");
            RunResult::failed(e)
        }
    }
}

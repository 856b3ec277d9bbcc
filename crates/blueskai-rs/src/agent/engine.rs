//! The completion engine seam: run an [`Agent`] on one input and stream what
//! happens.
//!
//! [`HarnessEngine`] is the production engine. It collects the agent's MCP
//! tools, then drives a [`Harness`] on a spawned task and forwards its events
//! into the returned [`RunStream`]. Tests substitute scripted engines.

use super::config::HarnessConfig;
use super::definition::Agent;
use super::events::{CompositeEventHandler, LoggingHandler};
use super::harness::Harness;
use super::stream::{RunStream, StreamForwarder, StreamedRun};
use crate::mcp::mcp_tool_set;
use crate::{Message, OpenAiClient};
use std::sync::Arc;
use tracing::debug;

/// Something that can run an agent and stream its events.
///
/// The stream ends after the last event of a successful run, or yields one
/// `Err` describing the failure (API error, tool server failure, turn limit
/// exceeded) and then ends.
pub trait CompletionEngine: Send + Sync {
    fn run_streamed(&self, agent: &Agent, input: &str, max_turns: u32) -> RunStream;
}

/// [`CompletionEngine`] backed by the chat completions API and the tool-use
/// harness.
#[derive(Clone)]
pub struct HarnessEngine {
    client: Arc<OpenAiClient>,
    config: HarnessConfig,
}

impl HarnessEngine {
    pub fn new(client: OpenAiClient) -> Self {
        Self::shared(Arc::new(client))
    }

    pub fn shared(client: Arc<OpenAiClient>) -> Self {
        Self {
            client,
            config: HarnessConfig::default(),
        }
    }

    /// Base configuration for every run. The model, agent name and round
    /// limit are overridden per run.
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }
}

impl CompletionEngine for HarnessEngine {
    fn run_streamed(&self, agent: &Agent, input: &str, max_turns: u32) -> RunStream {
        let client = Arc::clone(&self.client);
        let config = self
            .config
            .clone()
            .with_model(agent.model())
            .with_agent_name(agent.name())
            .with_max_rounds(max_turns);
        let servers = agent.mcp_servers().to_vec();
        let messages = vec![Message::system(agent.instructions()), Message::user(input)];

        Box::pin(StreamedRun::spawn(move |tx| async move {
            let tools = match mcp_tool_set(&servers).await {
                Ok(tools) => tools,
                Err(e) => {
                    let _ = tx.send(Err(e.to_string()));
                    return;
                }
            };
            debug!("Running with {} tool(s): {:?}", tools.len(), tools.names());

            let handler = CompositeEventHandler::new()
                .with(LoggingHandler)
                .with(StreamForwarder::new(tx.clone()));
            let result = Harness::new(&client, &tools, config)
                .with_event_handler(&handler)
                .run(messages)
                .await;
            if let Err(e) = result {
                let _ = tx.send(Err(e));
            }
        }))
    }
}

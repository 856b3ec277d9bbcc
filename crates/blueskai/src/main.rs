//! Process one instruction as one persona.
//!
//! ```sh
//! blueskai --profile 0 --instruction instructions/morning.md
//! blueskai --profile 1 --instruction post.md --model gpt-4.1-mini-2025-04-14
//! ```
//!
//! Configuration comes from the environment (and `.env` when present); see
//! [`Settings`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use blueskai::{
    Effort, LoadError, Model, RunResult, Runner, Settings, SettingsError, close_tool_servers,
    connect_tool_servers, loader, server_params,
};
use blueskai_rs::agent::{DEFAULT_MAX_TURNS, HarnessConfig, HarnessEngine};
use blueskai_rs::mcp::McpError;
use blueskai_rs::OpenAiClient;
use clap::Parser;
use thiserror::Error;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Run a persona agent on a markdown instruction.
#[derive(Parser)]
#[command(name = "blueskai", version)]
struct Cli {
    /// Index of the profile to use.
    #[arg(long)]
    profile: usize,

    /// Path to the markdown instruction file.
    #[arg(long)]
    instruction: PathBuf,

    /// Model to run the agent on.
    #[arg(long, value_enum, default_value_t = Model::O4Mini)]
    model: Model,

    /// Maximum model/tool round-trips.
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
    max_turns: u32,

    /// Abort the run after this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Retries for transient completion API failures.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Reasoning effort (o4-mini only).
    #[arg(long, value_enum)]
    reasoning_effort: Option<Effort>,

    /// Cap on completion tokens per model response.
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Run tool calls from the same turn one at a time.
    #[arg(long)]
    sequential_tools: bool,
}

/// Engine configuration for the chosen flags. The model and round limit
/// are set per run by the [`Runner`].
fn harness_config(cli: &Cli) -> HarnessConfig {
    let mut config = HarnessConfig::default()
        .with_retries(cli.retries)
        .with_sequential_tools(cli.sequential_tools);
    if let Some(max_tokens) = cli.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    match cli.reasoning_effort {
        Some(effort) if cli.model.is_reasoning() => {
            config = config.with_reasoning_effort(effort.into());
        }
        Some(_) => warn!("{} takes no reasoning effort; ignoring it", cli.model),
        None => {}
    }
    config
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("failed to create API client: {0}")]
    Client(String),
    #[error(transparent)]
    ToolServer(#[from] McpError),
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    // Values already in the environment win over the file.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run(cli).await {
        Ok(result) if result.success => {}
        Ok(_) => std::process::exit(1),
        Err(e) => {
            error!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<RunResult, StartupError> {
    let settings = Settings::from_env()?;
    let profile = settings.profile(cli.profile)?;

    println!("Profile: {}", profile.file_name());
    println!("Model: {}", cli.model);

    let persona = loader::load(&profile.file).await?;
    let instruction = loader::load(&cli.instruction).await?;

    let mut client =
        OpenAiClient::new(settings.openai_api_key.as_str()).map_err(StartupError::Client)?;
    if let Some(url) = &settings.openai_base_url {
        client = client.with_base_url(url);
    }
    let engine = HarnessEngine::new(client).with_config(harness_config(&cli));
    let runner = Runner::new(Arc::new(engine), cli.model.id())
        .with_max_turns(cli.max_turns)
        .with_timeout(cli.timeout_secs.map(Duration::from_secs));

    let servers = connect_tool_servers(server_params(&settings, profile)).await?;
    let result = runner
        .process_instruction(&persona, &instruction, servers.clone())
        .await;
    close_tool_servers(&servers).await;

    Ok(result)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

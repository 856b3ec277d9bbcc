//! Persona-driven Bluesky agent powered by blueskai-rs.
//!
//! A run reads a persona profile and a markdown instruction, builds an agent
//! that acts as that persona, connects the profile's MCP tool servers (`bsky`
//! for posting, `expertise` for lookups) and streams the run to the log.
//!
//! ```ignore
//! let settings = Settings::from_env()?;
//! let profile = settings.profile(0)?;
//! let persona = loader::load(&profile.file).await?;
//! let instruction = loader::load("instructions/morning.md").await?;
//!
//! let servers = connect_tool_servers(server_params(&settings, profile)).await?;
//! let engine = HarnessEngine::new(OpenAiClient::new(&settings.openai_api_key)?);
//! let result = Runner::new(Arc::new(engine), Model::default().id())
//!     .process_instruction(&persona, &instruction, servers.clone())
//!     .await;
//! close_tool_servers(&servers).await;
//! ```

pub mod loader;
pub mod persona;
pub mod prompt;
pub mod runner;
pub mod servers;
pub mod settings;

pub use loader::{LoadError, load};
pub use persona::{AGENT_NAME, Effort, Model, PersonaError, build_agent, persona_instructions};
pub use prompt::Prompt;
pub use runner::{RunResult, Runner, report};
pub use servers::{close_tool_servers, connect_tool_servers, server_params};
pub use settings::{Profile, Settings, SettingsError, ToolServerKind};

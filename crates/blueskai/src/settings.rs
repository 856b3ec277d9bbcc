//! Process configuration, read once from the environment.
//!
//! Every value the binary needs lives in [`Settings`]; nothing reads the
//! environment after startup. [`Settings::from_lookup`] takes any key lookup
//! so tests never touch the real process environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PROFILES_DIR: &str = "profiles";
pub const DEFAULT_BSKY_RMCP_BIN: &str = "bin/bsky-rmcp";
pub const DEFAULT_TOOLS: &str = "bsky,expertise";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("environment variable {0} is not set")]
    MissingVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: String, reason: String },

    #[error("no profiles configured (set BLUESKY_IDENTIFIER_0 and BLUESKY_APP_PASSWORD_0)")]
    NoProfiles,

    #[error("profile {index} is not configured ({count} available)")]
    UnknownProfile { index: usize, count: usize },
}

/// The tool servers a profile can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolServerKind {
    Bsky,
    Expertise,
}

impl ToolServerKind {
    /// Startup order of the servers.
    pub const ALL: [ToolServerKind; 2] = [ToolServerKind::Bsky, ToolServerKind::Expertise];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolServerKind::Bsky => "bsky",
            ToolServerKind::Expertise => "expertise",
        }
    }
}

impl fmt::Display for ToolServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown tool server '{s}' (expected bsky or expertise)"))
    }
}

/// One configured persona and the Bluesky account it posts as.
#[derive(Clone, PartialEq, Eq)]
pub struct Profile {
    pub index: usize,
    /// Persona markdown file.
    pub file: PathBuf,
    pub tools: Vec<ToolServerKind>,
    pub bsky_identifier: String,
    pub bsky_app_password: String,
}

impl Profile {
    pub fn enables(&self, kind: ToolServerKind) -> bool {
        self.tools.contains(&kind)
    }

    /// File name of the persona file, for display.
    pub fn file_name(&self) -> String {
        self.file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("index", &self.index)
            .field("file", &self.file)
            .field("tools", &self.tools)
            .field("bsky_identifier", &self.bsky_identifier)
            .field("bsky_app_password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Settings {
    pub openai_api_key: String,
    /// Chat completions URL override.
    pub openai_base_url: Option<String>,
    /// IANA zone name handed to the bsky server.
    pub timezone: String,
    pub expertise_mcp_url: String,
    pub bsky_rmcp_bin: PathBuf,
    pub profiles: Vec<Profile>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("openai_api_key", &"<redacted>")
            .field("openai_base_url", &self.openai_base_url)
            .field("timezone", &self.timezone)
            .field("expertise_mcp_url", &self.expertise_mcp_url)
            .field("bsky_rmcp_bin", &self.bsky_rmcp_bin)
            .field("profiles", &self.profiles)
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup. Empty values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required =
            |key: &str| optional(key).ok_or_else(|| SettingsError::MissingVar(key.to_string()));

        let openai_api_key = required("OPENAI_API_KEY")?;
        let timezone = required("TZ")?;
        let expertise_mcp_url = required("EXPERTISE_MCP_URL")?;
        let profiles_dir =
            PathBuf::from(optional("BLUESKAI_PROFILES_DIR").unwrap_or(DEFAULT_PROFILES_DIR.into()));
        let bsky_rmcp_bin =
            PathBuf::from(optional("BSKY_RMCP_BIN").unwrap_or(DEFAULT_BSKY_RMCP_BIN.into()));

        let mut profiles = Vec::new();
        for index in 0.. {
            let identifier_var = format!("BLUESKY_IDENTIFIER_{index}");
            let Some(bsky_identifier) = optional(identifier_var.as_str()) else {
                break;
            };
            let password_var = format!("BLUESKY_APP_PASSWORD_{index}");
            let bsky_app_password = required(password_var.as_str())?;
            let tools_var = format!("BLUESKAI_TOOLS_{index}");
            let tools = match lookup(tools_var.as_str()) {
                Some(raw) => parse_tools(&tools_var, &raw)?,
                None => parse_tools(&tools_var, DEFAULT_TOOLS)?,
            };
            profiles.push(Profile {
                index,
                file: profile_file(&profiles_dir, index),
                tools,
                bsky_identifier,
                bsky_app_password,
            });
        }
        if profiles.is_empty() {
            return Err(SettingsError::NoProfiles);
        }

        Ok(Self {
            openai_api_key,
            openai_base_url: optional("OPENAI_BASE_URL"),
            timezone,
            expertise_mcp_url,
            bsky_rmcp_bin,
            profiles,
        })
    }

    pub fn profile(&self, index: usize) -> Result<&Profile, SettingsError> {
        self.profiles
            .get(index)
            .ok_or(SettingsError::UnknownProfile {
                index,
                count: self.profiles.len(),
            })
    }
}

fn profile_file(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index:02}.md"))
}

/// Parse a comma-separated server list. Blank entries are skipped and
/// duplicates collapse; an empty list enables no servers.
fn parse_tools(var: &str, raw: &str) -> Result<Vec<ToolServerKind>, SettingsError> {
    let mut tools = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let kind = entry.parse().map_err(|reason| SettingsError::InvalidVar {
            var: var.to_string(),
            reason,
        })?;
        if !tools.contains(&kind) {
            tools.push(kind);
        }
    }
    Ok(tools)
}

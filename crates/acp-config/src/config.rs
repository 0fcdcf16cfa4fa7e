use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::catalog::well_known_agents;
use crate::error::ConfigError;

const QUALIFIER: &str = "";
const ORGANIZATION: &str = "bytesmith";
const APPLICATION: &str = "bytesmith";
const CONFIG_FILE_NAME: &str = "config.json";

/// A single configured agent: the command to run and how to run it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentConfig {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "autoDetect", default)]
    pub auto_detect: bool,
}

/// An MCP server the agent subprocess should be told about, if the agent
/// supports forwarding one. Opaque to this crate beyond storage.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(rename = "defaultAgent", default, skip_serializing_if = "Option::is_none")]
    pub default_agent: Option<String>,
    #[serde(rename = "defaultCwd", default, skip_serializing_if = "Option::is_none")]
    pub default_cwd: Option<String>,
    #[serde(rename = "autoApprove", default)]
    pub auto_approve: bool,
}

fn default_theme() -> String {
    "system".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: default_theme(),
            default_agent: None,
            default_cwd: None,
            auto_approve: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub agents: Vec<AgentConfig>,
    #[serde(rename = "mcpServers", default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerConfig>,
    #[serde(default)]
    pub settings: Settings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agents: well_known_agents()
                .iter()
                .map(|agent| agent.to_agent_config())
                .collect(),
            mcp_servers: Vec::new(),
            settings: Settings::default(),
        }
    }
}

impl Config {
    pub fn agent(&self, name: &str) -> Result<&AgentConfig, ConfigError> {
        self.agents
            .iter()
            .find(|agent| agent.name == name)
            .ok_or_else(|| ConfigError::UnknownAgent(name.to_string()))
    }
}

/// Resolves the platform user-config directory and the full path to
/// `config.json` within it, without touching the filesystem.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dirs = ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or(ConfigError::NoConfigDir)?;
    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Loads the config from disk, writing and returning a default config if
/// the file does not exist yet.
pub fn load() -> Result<Config, ConfigError> {
    load_from(&config_path()?)
}

/// Saves `config` to the platform config path, creating parent
/// directories as needed.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_to(&config_path()?, config)
}

fn load_from(path: &Path) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            let config = Config::default();
            save_to(path, &config)?;
            Ok(config)
        }
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn save_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let serialized = serde_json::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, serialized).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_replaced_with_a_written_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded, Config::default());
        assert!(path.exists());

        let reloaded = load_from(&path).unwrap();
        assert_eq!(reloaded, loaded);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.settings.default_agent = Some("claude-code".into());
        config.settings.auto_approve = true;
        save_to(&path, &config).unwrap();

        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn unknown_agent_lookup_fails() {
        let config = Config::default();
        assert!(config.agent("does-not-exist").is_err());
    }
}

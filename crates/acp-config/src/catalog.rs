use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// A compile-time description of an agent this crate knows how to launch
/// out of the box. `command` is looked up on `PATH` to decide whether the
/// agent is actually installed.
pub struct WellKnownAgent {
    pub name: &'static str,
    pub display_name: &'static str,
    pub command: &'static str,
    pub args: &'static [&'static str],
    pub description: &'static str,
}

impl WellKnownAgent {
    pub(crate) fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            name: self.name.to_string(),
            display_name: self.display_name.to_string(),
            command: self.command.to_string(),
            args: self.args.iter().map(|arg| arg.to_string()).collect(),
            env: None,
            description: Some(self.description.to_string()),
            auto_detect: true,
        }
    }
}

/// The agents this crate ships detection rules for. New entries belong
/// here, not scattered across call sites.
pub const WELL_KNOWN_AGENTS: &[WellKnownAgent] = &[
    WellKnownAgent {
        name: "claude-code",
        display_name: "Claude Code",
        command: "claude-code-acp",
        args: &[],
        description: "Anthropic's Claude Code, speaking the Agent Client Protocol.",
    },
    WellKnownAgent {
        name: "gemini-cli",
        display_name: "Gemini CLI",
        command: "gemini",
        args: &["--experimental-acp"],
        description: "Google's Gemini CLI, in Agent Client Protocol mode.",
    },
    WellKnownAgent {
        name: "codex",
        display_name: "Codex",
        command: "codex",
        args: &["acp"],
        description: "OpenAI's Codex CLI, in Agent Client Protocol mode.",
    },
];

pub fn well_known_agents() -> &'static [WellKnownAgent] {
    WELL_KNOWN_AGENTS
}

/// A well-known agent paired with whether its command was found on `PATH`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectedAgent {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub command: String,
    pub installed: bool,
}

/// Runs `PATH` lookup for every well-known agent's command token.
pub fn detect_installed_agents() -> Vec<DetectedAgent> {
    WELL_KNOWN_AGENTS
        .iter()
        .map(|agent| DetectedAgent {
            name: agent.name.to_string(),
            display_name: agent.display_name.to_string(),
            command: agent.command.to_string(),
            installed: which::which(agent.command).is_ok(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_installed_agents_covers_every_catalog_entry() {
        let detected = detect_installed_agents();
        assert_eq!(detected.len(), WELL_KNOWN_AGENTS.len());
    }

    #[test]
    fn detected_agents_carry_the_catalog_command_token() {
        let detected = detect_installed_agents();
        for (agent, entry) in WELL_KNOWN_AGENTS.iter().zip(detected.iter()) {
            assert_eq!(agent.command, entry.command);
            assert_eq!(agent.name, entry.name);
        }
    }
}

use acp_wire::{AvailableCommand, ContentBlock, PlanEntry};
use serde::{Deserialize, Serialize};

use crate::store::{MessageRole, ToolCallRecord};

/// One entry in the permission dialog the agent asked the client to show.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PermissionEventOption {
    pub option_id: String,
    pub name: String,
}

/// A change recorded by the filesystem provider's write path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub old_content: String,
    pub new_content: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

/// Everything the surrounding shell can subscribe to. Each variant maps to
/// one of the stable topic names in `topic()` — field naming is part of the
/// wire contract and must not change across versions.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum ConsumerEvent {
    #[serde(rename = "agent:message")]
    AgentMessage {
        session_id: String,
        role: MessageRole,
        content: ContentBlock,
    },
    #[serde(rename = "agent:toolcall")]
    AgentToolCall {
        session_id: String,
        tool_call: ToolCallRecord,
        is_update: bool,
    },
    #[serde(rename = "agent:plan")]
    AgentPlan {
        session_id: String,
        entries: Vec<PlanEntry>,
    },
    #[serde(rename = "agent:commands")]
    AgentCommands {
        session_id: String,
        available_commands: Vec<AvailableCommand>,
    },
    #[serde(rename = "agent:permission")]
    AgentPermission {
        connection_id: String,
        session_id: String,
        tool_call_id: String,
        title: String,
        options: Vec<PermissionEventOption>,
    },
    #[serde(rename = "agent:prompt-done")]
    AgentPromptDone {
        session_id: String,
        stop_reason: String,
    },
    #[serde(rename = "agent:error")]
    AgentError { session_id: String, error: String },
    #[serde(rename = "agent:stderr")]
    AgentStderr {
        connection_id: String,
        line: String,
    },
    #[serde(rename = "file:changed")]
    FileChanged { change: FileChange },
    #[serde(rename = "terminal:output")]
    TerminalOutput {
        terminal_id: String,
        chunk: String,
    },
}

impl ConsumerEvent {
    /// The stable topic name a shell subscribes to.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::AgentMessage { .. } => "agent:message",
            Self::AgentToolCall { .. } => "agent:toolcall",
            Self::AgentPlan { .. } => "agent:plan",
            Self::AgentCommands { .. } => "agent:commands",
            Self::AgentPermission { .. } => "agent:permission",
            Self::AgentPromptDone { .. } => "agent:prompt-done",
            Self::AgentError { .. } => "agent:error",
            Self::AgentStderr { .. } => "agent:stderr",
            Self::FileChanged { .. } => "file:changed",
            Self::TerminalOutput { .. } => "terminal:output",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_match_serde_tags() {
        let event = ConsumerEvent::AgentError {
            session_id: "s1".into(),
            error: "boom".into(),
        };
        assert_eq!(event.topic(), "agent:error");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["topic"], "agent:error");
    }
}

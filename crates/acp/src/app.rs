use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use acp_client::types::{
    ClientCapabilities, ClientIdentity, FsCapabilities, SessionNewParams, SessionPromptParams,
};
use acp_client::{Capabilities, ConnectionEvent, ConnectionManager, FilesystemProvider, PermissionProvider, TerminalProvider};
use acp_config::{AgentConfig, Config};
use acp_providers::{FileSystemProvider, PermissionBridge, TerminalPool};
use acp_session::{ConsumerEvent, SessionRecord, SessionStore};
use acp_transport::ChildConfig;
use acp_wire::ContentBlock;
use tokio::sync::{mpsc, RwLock};

use crate::directory::{DirectoryPicker, NullDirectoryPicker};
use crate::error::AcpError;
use crate::session_bridge;
use crate::settings::{JsonSettingsStore, Settings, SettingsStore};

const CLIENT_NAME: &str = "bytesmith";
const CLIENT_TITLE: &str = "Bytesmith";

struct ConnectionProviders {
    agent_name: String,
    terminal: Arc<TerminalPool>,
    permission: Arc<PermissionBridge>,
}

/// Ties the whole stack together: agent configuration, live connections,
/// session history, and the single event stream a shell subscribes to.
///
/// Owns no UI. `SettingsStore` and `DirectoryPicker` are trait seams a GUI
/// shell can override; [`Acp::new`] wires in the JSON-backed default and a
/// directory picker that always cancels.
pub struct Acp {
    manager: ConnectionManager,
    sessions: Arc<SessionStore>,
    config: RwLock<Config>,
    providers: RwLock<HashMap<String, ConnectionProviders>>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
    settings_store: Arc<dyn SettingsStore>,
    directory_picker: Arc<dyn DirectoryPicker>,
}

impl Acp {
    /// Loads (or creates) the on-disk config and returns the facade plus
    /// the receiving half of its event stream. There is exactly one
    /// receiver: every connection's providers and every prompt fan their
    /// events into it.
    pub async fn new() -> Result<(Self, mpsc::UnboundedReceiver<ConsumerEvent>), AcpError> {
        let config = tokio::task::spawn_blocking(acp_config::load)
            .await
            .expect("blocking config load task panicked")?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> (Self, mpsc::UnboundedReceiver<ConsumerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let acp = Self {
            manager: ConnectionManager::new(),
            sessions: Arc::new(SessionStore::new()),
            config: RwLock::new(config),
            providers: RwLock::new(HashMap::new()),
            events: events_tx,
            settings_store: Arc::new(JsonSettingsStore::new()),
            directory_picker: Arc::new(NullDirectoryPicker::new()),
        };
        (acp, events_rx)
    }

    /// Swaps in a shell-supplied settings store, e.g. one backed by a
    /// platform preferences API instead of `config.json`.
    pub fn with_settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = store;
        self
    }

    /// Swaps in a shell-supplied directory picker backed by real platform UI.
    pub fn with_directory_picker(mut self, picker: Arc<dyn DirectoryPicker>) -> Self {
        self.directory_picker = picker;
        self
    }

    pub async fn list_agents(&self) -> Vec<AgentConfig> {
        self.config.read().await.agents.clone()
    }

    /// Spawns the named agent's subprocess and performs the ACP handshake.
    /// Returns the connection id the rest of the API keys on.
    pub async fn connect(&self, agent_name: &str, cwd: impl Into<String>) -> Result<String, AcpError> {
        let cwd = cwd.into();
        let agent_config = {
            let config = self.config.read().await;
            config.agent(agent_name)?.clone()
        };

        let child_config = ChildConfig {
            command: PathBuf::from(&agent_config.command),
            args: agent_config.args.iter().map(OsString::from).collect(),
            env: agent_config
                .env
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|(key, value)| (OsString::from(key), OsString::from(value)))
                .collect(),
            cwd: Some(PathBuf::from(&cwd)),
        };

        let fs_provider = Arc::new(FileSystemProvider::new(agent_name, self.events.clone()));
        let terminal_pool = Arc::new(TerminalPool::new(self.events.clone()));
        let permission_bridge = Arc::new(PermissionBridge::new(self.events.clone()));

        let capabilities = Capabilities {
            fs: Some(fs_provider.clone() as Arc<dyn FilesystemProvider>),
            terminal: Some(terminal_pool.clone() as Arc<dyn TerminalProvider>),
            permission: Some(permission_bridge.clone() as Arc<dyn PermissionProvider>),
        };

        let client_info = ClientIdentity {
            name: CLIENT_NAME.into(),
            title: CLIENT_TITLE.into(),
            version: env!("CARGO_PKG_VERSION").into(),
        };
        let client_capabilities = ClientCapabilities {
            fs: FsCapabilities {
                read_text_file: true,
                write_text_file: true,
            },
            terminal: true,
        };

        let (connection_id, mut connection_events) = self
            .manager
            .connect(child_config, client_info, client_capabilities, capabilities)
            .await?;

        self.providers.write().await.insert(
            connection_id.clone(),
            ConnectionProviders {
                agent_name: agent_name.to_string(),
                terminal: terminal_pool,
                permission: permission_bridge,
            },
        );

        let sessions = self.sessions.clone();
        let events = self.events.clone();
        let stderr_connection_id = connection_id.clone();
        tokio::spawn(async move {
            while let Some(event) = connection_events.recv().await {
                match event {
                    ConnectionEvent::SessionUpdate(params) => {
                        session_bridge::apply(&sessions, &events, &params).await;
                    }
                    ConnectionEvent::Stderr(line) => {
                        let _ = events.send(ConsumerEvent::AgentStderr {
                            connection_id: stderr_connection_id.clone(),
                            line,
                        });
                    }
                }
            }
        });

        Ok(connection_id)
    }

    /// Closes the connection's subprocess and releases any terminals it
    /// still had open.
    pub async fn disconnect(&self, connection_id: &str) -> Result<(), AcpError> {
        self.manager.disconnect(connection_id).await?;
        if let Some(entry) = self.providers.write().await.remove(connection_id) {
            entry.terminal.close_all().await;
        }
        Ok(())
    }

    pub async fn list_connections(&self) -> Vec<String> {
        self.manager.list().await
    }

    /// Starts a new session on an existing connection and records it
    /// locally so history and tool-call state can accumulate.
    pub async fn new_session(&self, connection_id: &str, cwd: impl Into<String>) -> Result<String, AcpError> {
        let cwd = cwd.into();
        let client = self.manager.get(connection_id).await?;
        let result = client
            .session_new(SessionNewParams {
                cwd: cwd.clone(),
                mcp_servers: Vec::new(),
            })
            .await?;

        let agent_name = self
            .providers
            .read()
            .await
            .get(connection_id)
            .map(|entry| entry.agent_name.clone())
            .unwrap_or_default();
        self.sessions
            .create(result.session_id.clone(), agent_name, connection_id, cwd)
            .await;

        Ok(result.session_id)
    }

    /// Sends a prompt and returns as soon as the agent has accepted it; the
    /// turn itself runs in a background task that emits `agent:prompt-done`
    /// or `agent:error` when it settles.
    pub async fn send_prompt(
        &self,
        connection_id: &str,
        session_id: &str,
        prompt: Vec<ContentBlock>,
        deadline: Duration,
    ) -> Result<(), AcpError> {
        let client = self.manager.get(connection_id).await?;
        self.sessions.get(session_id).await?;

        for block in &prompt {
            let _ = self
                .sessions
                .add_message(session_id, acp_session::MessageRole::User, block.clone(), 0)
                .await;
            let _ = self.events.send(ConsumerEvent::AgentMessage {
                session_id: session_id.to_string(),
                role: acp_session::MessageRole::User,
                content: block.clone(),
            });
        }

        let events = self.events.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            let params = SessionPromptParams {
                session_id: session_id.clone(),
                prompt,
            };
            match client.session_prompt(params, deadline).await {
                Ok(result) => {
                    let _ = events.send(ConsumerEvent::AgentPromptDone {
                        session_id,
                        stop_reason: session_bridge::stop_reason_str(result.stop_reason).to_string(),
                    });
                }
                Err(err) => {
                    let _ = events.send(ConsumerEvent::AgentError {
                        session_id,
                        error: err.to_string(),
                    });
                }
            }
        });

        Ok(())
    }

    pub async fn cancel_prompt(&self, connection_id: &str, session_id: &str) -> Result<(), AcpError> {
        let client = self.manager.get(connection_id).await?;
        client.cancel_prompt(session_id).await?;
        Ok(())
    }

    pub async fn session_history(&self, session_id: &str) -> Result<SessionRecord, AcpError> {
        Ok(self.sessions.get(session_id).await?)
    }

    pub async fn list_sessions(&self) -> Vec<SessionRecord> {
        self.sessions.list().await
    }

    /// Resolves the pending permission request on `connection_id` with
    /// the chosen option.
    pub async fn respond_permission(
        &self,
        connection_id: &str,
        option_id: impl Into<String>,
    ) -> Result<(), AcpError> {
        let providers = self.providers.read().await;
        let entry = providers
            .get(connection_id)
            .ok_or_else(|| AcpError::UnknownConnection(connection_id.to_string()))?;
        entry.permission.respond(connection_id, option_id).await;
        Ok(())
    }

    /// Dismisses the pending permission request on `connection_id` without
    /// picking an option.
    pub async fn cancel_permission(&self, connection_id: &str) -> Result<(), AcpError> {
        let providers = self.providers.read().await;
        let entry = providers
            .get(connection_id)
            .ok_or_else(|| AcpError::UnknownConnection(connection_id.to_string()))?;
        entry.permission.cancel(connection_id).await;
        Ok(())
    }

    pub async fn get_settings(&self) -> Result<Settings, AcpError> {
        self.settings_store.get().await
    }

    pub async fn save_settings(&self, settings: Settings) -> Result<(), AcpError> {
        self.settings_store.save(settings).await
    }

    pub async fn pick_directory(&self, start_dir: Option<String>) -> Result<Option<String>, AcpError> {
        self.directory_picker.pick_directory(start_dir).await
    }

    pub async fn list_files(&self, root: impl Into<String>) -> Result<Vec<String>, AcpError> {
        crate::files::list_files(root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A minimal shell-script stand-in for an ACP agent: answers
    // `initialize`, `session/new`, and `session/prompt`, ignoring
    // everything else. Matches the donor's pattern of driving a
    // test-written script over real stdio rather than mocking the
    // transport.
    const FIXTURE_SCRIPT: &str = r#"#!/bin/sh
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":1,"agentCapabilities":{},"agentInfo":{"name":"fixture","version":"0"}}}'
      ;;
    *'"method":"session/new"'*)
      id=$(echo "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
      echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"sessionId\":\"s1\"}}"
      ;;
    *'"method":"session/prompt"'*)
      id=$(echo "$line" | sed -n 's/.*"id":\([0-9]*\).*/\1/p')
      echo "{\"jsonrpc\":\"2.0\",\"id\":$id,\"result\":{\"stopReason\":\"end_turn\"}}"
      ;;
  esac
done
"#;

    fn fixture_config(script_path: &std::path::Path) -> Config {
        let mut config = Config {
            agents: Vec::new(),
            mcp_servers: Vec::new(),
            settings: Default::default(),
        };
        config.agents.push(AgentConfig {
            name: "fixture".into(),
            display_name: "Fixture".into(),
            command: "/bin/sh".into(),
            args: vec![script_path.to_string_lossy().into_owned()],
            env: None,
            description: None,
            auto_detect: false,
        });
        config
    }

    #[tokio::test]
    async fn connect_new_session_and_prompt_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("fixture.sh");
        std::fs::write(&script_path, FIXTURE_SCRIPT).unwrap();

        let (acp, mut events) = Acp::with_config(fixture_config(&script_path));
        let cwd = dir.path().to_string_lossy().into_owned();

        let connection_id = acp.connect("fixture", cwd.clone()).await.unwrap();
        assert_eq!(acp.list_connections().await, vec![connection_id.clone()]);

        let session_id = acp.new_session(&connection_id, cwd).await.unwrap();

        acp.send_prompt(
            &connection_id,
            &session_id,
            vec![ContentBlock::Text { text: "hi".into() }],
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let done = loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event within timeout")
                .expect("event stream still open");
            if event.topic() == "agent:prompt-done" {
                break event;
            }
        };
        match done {
            ConsumerEvent::AgentPromptDone { stop_reason, .. } => assert_eq!(stop_reason, "end_turn"),
            other => panic!("expected prompt-done, got {other:?}"),
        }

        let history = acp.session_history(&session_id).await.unwrap();
        assert_eq!(history.messages.len(), 1);

        acp.disconnect(&connection_id).await.unwrap();
        assert!(acp.list_connections().await.is_empty());
    }

    #[tokio::test]
    async fn connect_to_unknown_agent_fails() {
        let (acp, _events) = Acp::with_config(Config {
            agents: Vec::new(),
            mcp_servers: Vec::new(),
            settings: Default::default(),
        });
        let result = acp.connect("does-not-exist", "/tmp").await;
        assert!(result.is_err());
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use acp_transport::ChildConfig;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::client::{ConnectionEvent, ProtocolClient};
use crate::error::ClientError;
use crate::inbound::Capabilities;
use crate::types::{ClientCapabilities, ClientIdentity};

struct Entry {
    client: Arc<ProtocolClient>,
}

/// Owns every live agent connection, keyed by a server-minted UUID so a
/// consumer never has to invent or track its own connection ids.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<String, Entry>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns and initializes a new connection, registers it, and returns
    /// its id plus the event receiver the caller should drain.
    pub async fn connect(
        &self,
        config: ChildConfig,
        client_info: ClientIdentity,
        client_capabilities: ClientCapabilities,
        capabilities: Capabilities,
    ) -> Result<(String, mpsc::UnboundedReceiver<ConnectionEvent>), ClientError> {
        let id = Uuid::new_v4().to_string();
        let (client, events) = ProtocolClient::connect(
            id.clone(),
            config,
            client_info,
            client_capabilities,
            capabilities,
        )
        .await?;

        self.connections.write().await.insert(
            id.clone(),
            Entry {
                client: Arc::new(client),
            },
        );

        Ok((id, events))
    }

    pub async fn get(&self, connection_id: &str) -> Result<Arc<ProtocolClient>, ClientError> {
        self.connections
            .read()
            .await
            .get(connection_id)
            .map(|entry| entry.client.clone())
            .ok_or_else(|| ClientError::UnknownConnection(connection_id.to_string()))
    }

    pub async fn list(&self) -> Vec<String> {
        self.connections.read().await.keys().cloned().collect()
    }

    /// Closes and forgets one connection. A second call for the same id is
    /// a no-op rather than an error, matching `StdioTransport::close`'s own
    /// idempotence.
    pub async fn disconnect(&self, connection_id: &str) -> Result<(), ClientError> {
        let entry = self.connections.write().await.remove(connection_id);
        if let Some(entry) = entry {
            entry.client.close().await?;
        }
        Ok(())
    }

    /// Closes every connection, e.g. during process shutdown.
    pub async fn disconnect_all(&self) {
        let entries: Vec<Arc<ProtocolClient>> = {
            let mut connections = self.connections.write().await;
            connections.drain().map(|(_, entry)| entry.client).collect()
        };
        for client in entries {
            if let Err(err) = client.close().await {
                tracing::warn!(connection_id = client.id(), "error closing connection: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh_config(script: &str) -> ChildConfig {
        ChildConfig {
            command: PathBuf::from("/bin/sh"),
            args: vec!["-c".into(), script.into()],
            env: Vec::new(),
            cwd: None,
        }
    }

    #[tokio::test]
    async fn unknown_connection_lookup_fails() {
        let manager = ConnectionManager::new();
        let result = manager.get("does-not-exist").await;
        assert!(matches!(result, Err(ClientError::UnknownConnection(_))));
    }

    #[tokio::test]
    async fn disconnect_of_unknown_connection_is_a_no_op() {
        let manager = ConnectionManager::new();
        manager.disconnect("does-not-exist").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connect_to_non_agent_process_times_out_on_initialize() {
        // `cat` never answers `initialize`, so the handshake should time out
        // rather than hang forever. Exercises the manager's error plumbing
        // without needing a real ACP-speaking fixture binary.
        let manager = ConnectionManager::new();
        let result = manager
            .connect(
                sh_config("cat"),
                ClientIdentity {
                    name: "test".into(),
                    title: "Test Client".into(),
                    version: "0.0.0".into(),
                },
                ClientCapabilities::default(),
                Capabilities::default(),
            )
            .await;
        assert!(result.is_err());
    }
}

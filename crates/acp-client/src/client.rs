use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use acp_transport::{ChildConfig, StdioTransport};
use acp_wire::{methods, Classified, Envelope, ErrorObject, SessionUpdateParams};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::warn;

use crate::error::ClientError;
use crate::inbound::{self, Capabilities};
use crate::pending::PendingTable;
use crate::types::{
    ClientCapabilities, ClientIdentity, InitializeParams, InitializeResult, SessionCancelParams,
    SessionLoadParams, SessionLoadResult, SessionNewParams, SessionNewResult, SessionPromptParams,
    SessionPromptResult, SessionSetModeParams, SessionSetModeResult, PROTOCOL_VERSION,
};

/// Calls other than `session/prompt` give up after this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A session-scoped push from the agent: a `session/update` notification,
/// or the agent's stderr output.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    SessionUpdate(SessionUpdateParams),
    Stderr(String),
}

/// A live connection to one agent subprocess. Owns the transport, the
/// request/response correlation table, and the capability providers the
/// agent may call back into.
pub struct ProtocolClient {
    id: String,
    transport: Arc<StdioTransport>,
    pending: Arc<PendingTable>,
    next_id: AtomicU64,
    capabilities: Capabilities,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ProtocolClient {
    /// Spawns the agent binary and performs the `initialize` handshake.
    /// Returns the connected client plus the receiving half of its event
    /// stream (session updates and stderr lines).
    pub async fn connect(
        connection_id: impl Into<String>,
        config: ChildConfig,
        client_info: ClientIdentity,
        client_capabilities: ClientCapabilities,
        capabilities: Capabilities,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ConnectionEvent>), ClientError> {
        let transport = Arc::new(StdioTransport::spawn(config).await?);
        let pending = Arc::new(PendingTable::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let client = Self {
            id: connection_id.into(),
            transport: transport.clone(),
            pending: pending.clone(),
            next_id: AtomicU64::new(1),
            capabilities,
            events: events_tx.clone(),
        };

        let mut stderr_rx = transport
            .take_stderr()
            .await
            .expect("take_stderr called exactly once, right after spawn");
        let stderr_events = events_tx.clone();
        tokio::spawn(async move {
            while let Some(line) = stderr_rx.recv().await {
                let _ = stderr_events.send(ConnectionEvent::Stderr(line));
            }
        });

        // The handler closure is stored inside `transport`'s own state
        // (`shared.handler`), so it must not hold a strong `Arc` back to
        // `transport` or the two would keep each other alive forever. Hold
        // a `Weak` instead and upgrade only for the lifetime of one
        // dispatched request.
        let handler_connection_id = client.id.clone();
        let handler_transport = Arc::downgrade(&transport);
        let handler_pending = pending.clone();
        let handler_caps = client.capabilities.clone();
        let handler_events = events_tx.clone();
        transport
            .set_handler(move |envelope| {
                let connection_id = handler_connection_id.clone();
                let transport = handler_transport.clone();
                let pending = handler_pending.clone();
                let caps = handler_caps.clone();
                let events = handler_events.clone();
                tokio::spawn(async move {
                    if let Some(transport) = transport.upgrade() {
                        handle_inbound(connection_id, envelope, transport, pending, caps, events).await;
                    }
                });
            })
            .await;
        transport.start().await?;

        if let Err(err) = client.initialize(client_info, client_capabilities).await {
            let _ = transport.close().await;
            pending.fail_all(|| ClientError::Cancelled);
            return Err(ClientError::Handshake(err.to_string()));
        }

        Ok((client, events_rx))
    }

    async fn initialize(
        &self,
        client_info: ClientIdentity,
        client_capabilities: ClientCapabilities,
    ) -> Result<InitializeResult, ClientError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION,
            client_capabilities,
            client_info,
        };
        let value = self
            .call(methods::INITIALIZE, serde_json::to_value(params)?, DEFAULT_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn session_new(
        &self,
        params: SessionNewParams,
    ) -> Result<SessionNewResult, ClientError> {
        let value = self
            .call(methods::SESSION_NEW, serde_json::to_value(params)?, DEFAULT_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn session_load(
        &self,
        params: SessionLoadParams,
    ) -> Result<SessionLoadResult, ClientError> {
        let value = self
            .call(methods::SESSION_LOAD, serde_json::to_value(params)?, DEFAULT_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends a prompt and awaits the turn's outcome. `deadline` is used
    /// directly (not capped to `DEFAULT_TIMEOUT`): prompts legitimately run
    /// for a long time, and the caller is in the best position to say how
    /// long is too long.
    pub async fn session_prompt(
        &self,
        params: SessionPromptParams,
        deadline: Duration,
    ) -> Result<SessionPromptResult, ClientError> {
        let value = self
            .call(methods::SESSION_PROMPT, serde_json::to_value(params)?, deadline)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sends `session/cancel`. This is a notification, not a request: the
    /// agent is expected to answer the in-flight `session/prompt` call with
    /// a `cancelled` stop reason rather than a separate reply.
    pub async fn cancel_prompt(&self, session_id: impl Into<String>) -> Result<(), ClientError> {
        let params = SessionCancelParams {
            session_id: session_id.into(),
        };
        let envelope = Envelope::notification(methods::SESSION_CANCEL, serde_json::to_value(params)?);
        self.transport.send(&envelope).await?;
        Ok(())
    }

    pub async fn session_set_mode(
        &self,
        params: SessionSetModeParams,
    ) -> Result<SessionSetModeResult, ClientError> {
        let value = self
            .call(methods::SESSION_SET_MODE, serde_json::to_value(params)?, DEFAULT_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gracefully shuts down the subprocess and fails every outstanding call.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.transport.close().await?;
        self.pending.fail_all(|| ClientError::Cancelled);
        Ok(())
    }

    async fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let envelope = Envelope::request(id, method, params);
        if let Err(err) = self.transport.send(&envelope).await {
            self.pending.take(id);
            return Err(err.into());
        }

        match time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ClientError::ChannelClosed),
            Err(_) => {
                self.pending.take(id);
                Err(ClientError::Timeout(timeout))
            }
        }
    }
}

async fn handle_inbound(
    connection_id: String,
    envelope: Envelope,
    transport: Arc<StdioTransport>,
    pending: Arc<PendingTable>,
    caps: Capabilities,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let classified = match envelope.classify() {
        Ok(classified) => classified,
        Err(err) => {
            warn!("dropping unclassifiable frame: {err}");
            return;
        }
    };

    match classified {
        Classified::Response { id, result, error } => {
            let outcome = match error {
                Some(err) => Err(ClientError::Rpc {
                    code: err.code,
                    message: err.message.clone(),
                    data: err.data.clone(),
                }),
                None => Ok(result.cloned().unwrap_or(Value::Null)),
            };
            pending.complete(id, outcome);
        }
        Classified::Notification { method, params } => {
            if method == methods::SESSION_UPDATE {
                let params = params.cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<SessionUpdateParams>(params) {
                    Ok(update) => {
                        let _ = events.send(ConnectionEvent::SessionUpdate(update));
                    }
                    Err(err) => warn!("dropping malformed session/update: {err}"),
                }
            } else {
                warn!("ignoring unknown notification `{method}`");
            }
        }
        Classified::Request { id, method, params } => {
            let params = params.cloned().unwrap_or(Value::Null);
            let response = match inbound::dispatch_request(&connection_id, method, params, &caps).await {
                Ok(result) => Envelope::response_ok(id, result),
                Err(err) => Envelope::response_err(id, ErrorObject::new(err.code, err.message)),
            };
            if let Err(err) = transport.send(&response).await {
                warn!("failed to send response for `{method}`: {err}");
            }
        }
    }
}

use std::collections::HashMap;

use acp_client::types::{PermissionOutcome, RequestPermissionParams, RequestPermissionResult};
use acp_client::{DomainError, PermissionProvider};
use acp_session::{ConsumerEvent, PermissionEventOption};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::warn;

type Slot = oneshot::Sender<PermissionOutcome>;

/// Routes `requestPermission` calls to whatever is supervising the session
/// (normally a UI) and resolves once `respond` or `cancel` is called for
/// that connection.
///
/// The one-shot slot is keyed by connection id. A second concurrent
/// request on the same connection replaces the slot rather than queuing
/// behind it — the first caller's `request_permission` call then never
/// resolves via this slot and is left to the caller's own timeout, exactly
/// as the stated invariant allows, with the replacement logged.
pub struct PermissionBridge {
    slots: Mutex<HashMap<String, Slot>>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
}

impl PermissionBridge {
    pub fn new(events: mpsc::UnboundedSender<ConsumerEvent>) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Resolves the pending request on `connection_id` with the selected
    /// option. Targeting an unknown connection is silently ignored — the
    /// agent call may already have timed out.
    pub async fn respond(&self, connection_id: &str, option_id: impl Into<String>) {
        if let Some(tx) = self.slots.lock().await.remove(connection_id) {
            let _ = tx.send(PermissionOutcome::Selected {
                option_id: option_id.into(),
            });
        }
    }

    /// Resolves the pending request on `connection_id` as cancelled
    /// (e.g. the user dismissed the dialog without choosing).
    pub async fn cancel(&self, connection_id: &str) {
        if let Some(tx) = self.slots.lock().await.remove(connection_id) {
            let _ = tx.send(PermissionOutcome::Cancelled);
        }
    }
}

#[async_trait]
impl PermissionProvider for PermissionBridge {
    async fn request_permission(
        &self,
        connection_id: &str,
        params: RequestPermissionParams,
    ) -> Result<RequestPermissionResult, DomainError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slots = self.slots.lock().await;
            if slots.insert(connection_id.to_string(), tx).is_some() {
                warn!(
                    connection_id,
                    "replacing an already-pending permission request on this connection"
                );
            }
        }

        let _ = self.events.send(ConsumerEvent::AgentPermission {
            connection_id: connection_id.to_string(),
            session_id: params.session_id.clone(),
            tool_call_id: params.tool_call_id.clone(),
            title: params.title.clone(),
            options: params
                .options
                .iter()
                .map(|option| PermissionEventOption {
                    option_id: option.option_id.clone(),
                    name: option.name.clone(),
                })
                .collect(),
        });

        let outcome = rx.await.unwrap_or(PermissionOutcome::Cancelled);
        Ok(RequestPermissionResult { outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acp_client::types::{PermissionOption, PermissionOptionKind};

    #[tokio::test]
    async fn respond_resolves_the_pending_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = PermissionBridge::new(tx);

        let params = RequestPermissionParams {
            session_id: "s1".into(),
            tool_call_id: "tc1".into(),
            title: "Allow write?".into(),
            options: vec![PermissionOption {
                option_id: "opt-1".into(),
                name: "Allow".into(),
                kind: PermissionOptionKind::AllowOnce,
            }],
        };

        let bridge_ref = &bridge;
        let ((), result) = tokio::join!(
            async {
                // Let the request register its slot before we respond.
                tokio::task::yield_now().await;
                bridge_ref.respond("conn-1", "opt-1").await;
            },
            bridge_ref.request_permission("conn-1", params)
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "agent:permission");

        let result = result.unwrap();
        assert_eq!(
            result.outcome,
            PermissionOutcome::Selected {
                option_id: "opt-1".into()
            }
        );
    }

    #[tokio::test]
    async fn respond_to_unknown_connection_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let bridge = PermissionBridge::new(tx);
        bridge.respond("does-not-exist", "opt-1").await;
    }
}

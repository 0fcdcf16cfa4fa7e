use std::collections::HashMap;
use std::sync::Mutex;

use acp_wire::RequestId;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ClientError;

type Slot = oneshot::Sender<Result<Value, ClientError>>;

/// Correlates outbound request ids to the task awaiting their response.
///
/// Every id is completed exactly once: either the reader task resolves it
/// with the agent's response, or `close`/`cancel` resolves it with an error.
/// A second completion attempt is simply dropped (the oneshot's other half
/// is already gone).
#[derive(Default)]
pub struct PendingTable {
    slots: Mutex<HashMap<RequestId, Slot>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: RequestId, tx: Slot) {
        self.slots.lock().expect("pending table poisoned").insert(id, tx);
    }

    /// Removes and returns the slot for `id`, if still pending.
    pub fn take(&self, id: RequestId) -> Option<Slot> {
        self.slots.lock().expect("pending table poisoned").remove(&id)
    }

    /// Completes a pending call. No-op if the id is unknown (already
    /// completed, or never registered — e.g. a stray response from the
    /// agent).
    pub fn complete(&self, id: RequestId, result: Result<Value, ClientError>) {
        if let Some(tx) = self.take(id) {
            let _ = tx.send(result);
        }
    }

    /// Drains every pending slot, completing each with `err`. Used on
    /// transport close so no caller awaits a response that will never
    /// arrive.
    pub fn fail_all(&self, make_err: impl Fn() -> ClientError) {
        let drained: Vec<Slot> = {
            let mut slots = self.slots.lock().expect("pending table poisoned");
            slots.drain().map(|(_, tx)| tx).collect()
        };
        for tx in drained {
            let _ = tx.send(Err(make_err()));
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().expect("pending table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_exactly_once() {
        let table = PendingTable::new();
        let (tx, rx) = oneshot::channel();
        table.insert(1, tx);
        assert_eq!(table.len(), 1);

        table.complete(1, Ok(Value::Bool(true)));
        // Second completion for the same id is a no-op: already taken.
        table.complete(1, Err(ClientError::Cancelled));

        let got = rx.await.unwrap();
        assert_eq!(got.unwrap(), Value::Bool(true));
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn fail_all_drains_every_slot() {
        let table = PendingTable::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        table.insert(1, tx1);
        table.insert(2, tx2);

        table.fail_all(|| ClientError::ChannelClosed);

        assert!(table.is_empty());
        assert!(matches!(rx1.await.unwrap(), Err(ClientError::ChannelClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(ClientError::ChannelClosed)));
    }

    #[tokio::test]
    async fn unknown_id_completion_is_ignored() {
        let table = PendingTable::new();
        table.complete(42, Ok(Value::Null));
    }
}

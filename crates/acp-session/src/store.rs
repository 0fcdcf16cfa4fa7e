use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use acp_wire::{ContentBlock, ToolCallContentItem, ToolCallKind, ToolCallLocation, ToolCallStatus};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::SessionError;

/// Milliseconds since the Unix epoch. `0` from a caller means "stamp this
/// now" (see `addMessage`/`addToolCall`).
pub type Timestamp = u64;

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Agent,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub role: MessageRole,
    pub content: ContentBlock,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub title: String,
    pub kind: Option<ToolCallKind>,
    pub status: ToolCallStatus,
    /// The tool call's content/diff payload, persisted on every update
    /// rather than dropped.
    pub content: Option<Vec<ToolCallContentItem>>,
    pub locations: Option<Vec<ToolCallLocation>>,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub agent_name: String,
    pub connection_id: String,
    pub cwd: String,
    pub messages: Vec<MessageRecord>,
    pub tool_calls: Vec<ToolCallRecord>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SessionRecord {
    fn new(id: String, agent_name: String, connection_id: String, cwd: String) -> Self {
        let timestamp = now();
        Self {
            id,
            agent_name,
            connection_id,
            cwd,
            messages: Vec::new(),
            tool_calls: Vec::new(),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// A mapping from session id to a session record, guarded by a single
/// read-write lock. Reads (`get`, `list`) take the read side; mutations
/// take the write side only across the field assignments they perform,
/// never across I/O.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        id: impl Into<String>,
        agent_name: impl Into<String>,
        connection_id: impl Into<String>,
        cwd: impl Into<String>,
    ) -> SessionRecord {
        let record = SessionRecord::new(id.into(), agent_name.into(), connection_id.into(), cwd.into());
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        record
    }

    pub async fn get(&self, id: &str) -> Result<SessionRecord, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn list(&self) -> Vec<SessionRecord> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn delete(&self, id: &str) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Appends a message. `timestamp = 0` is treated as "stamp this now".
    pub async fn add_message(
        &self,
        id: &str,
        role: MessageRole,
        content: ContentBlock,
        timestamp: Timestamp,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.messages.push(MessageRecord {
            role,
            content,
            timestamp: if timestamp == 0 { now() } else { timestamp },
        });
        session.touch();
        Ok(())
    }

    pub async fn add_tool_call(
        &self,
        id: &str,
        tool_call: ToolCallRecord,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.tool_calls.push(tool_call);
        session.touch();
        Ok(())
    }

    /// Merges the given fields into the existing tool call record, leaving
    /// any field the caller left `None` untouched.
    pub async fn update_tool_call(
        &self,
        id: &str,
        tool_call_id: &str,
        title: Option<String>,
        kind: Option<ToolCallKind>,
        status: Option<ToolCallStatus>,
        content: Option<Vec<ToolCallContentItem>>,
        locations: Option<Vec<ToolCallLocation>>,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let tool_call = session
            .tool_calls
            .iter_mut()
            .find(|tc| tc.id == tool_call_id)
            .ok_or_else(|| SessionError::ToolCallNotFound(tool_call_id.to_string(), id.to_string()))?;

        if let Some(title) = title {
            tool_call.title = title;
        }
        if kind.is_some() {
            tool_call.kind = kind;
        }
        if let Some(status) = status {
            tool_call.status = status;
        }
        if content.is_some() {
            tool_call.content = content;
        }
        if locations.is_some() {
            tool_call.locations = locations;
        }
        tool_call.timestamp = now();
        session.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = SessionStore::new();
        let created = store.create("s1", "claude", "conn-1", "/tmp").await;
        let fetched = store.get("s1").await.unwrap();
        assert_eq!(created, fetched);
        assert!(fetched.messages.is_empty());
    }

    #[tokio::test]
    async fn messages_preserve_arrival_order() {
        let store = SessionStore::new();
        store.create("s1", "claude", "conn-1", "/tmp").await;
        store
            .add_message(
                "s1",
                MessageRole::User,
                ContentBlock::Text { text: "hi".into() },
                0,
            )
            .await
            .unwrap();
        store
            .add_message(
                "s1",
                MessageRole::Agent,
                ContentBlock::Text { text: "hello".into() },
                0,
            )
            .await
            .unwrap();

        let session = store.get("s1").await.unwrap();
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, MessageRole::User);
        assert_eq!(session.messages[1].role, MessageRole::Agent);
    }

    #[tokio::test]
    async fn update_tool_call_merges_only_present_fields() {
        let store = SessionStore::new();
        store.create("s1", "claude", "conn-1", "/tmp").await;
        store
            .add_tool_call(
                "s1",
                ToolCallRecord {
                    id: "tc1".into(),
                    title: "Reading file".into(),
                    kind: Some(ToolCallKind::Read),
                    status: ToolCallStatus::Pending,
                    content: None,
                    locations: None,
                    timestamp: 0,
                },
            )
            .await
            .unwrap();

        store
            .update_tool_call("s1", "tc1", None, None, Some(ToolCallStatus::Completed), None, None)
            .await
            .unwrap();

        let session = store.get("s1").await.unwrap();
        let tool_call = &session.tool_calls[0];
        assert_eq!(tool_call.status, ToolCallStatus::Completed);
        assert_eq!(tool_call.title, "Reading file");
    }

    #[tokio::test]
    async fn unknown_session_lookup_fails() {
        let store = SessionStore::new();
        assert!(matches!(store.get("nope").await, Err(SessionError::NotFound(_))));
    }
}

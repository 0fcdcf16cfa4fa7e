#![forbid(unsafe_code)]
//! Conversation history and the consumer-facing event model.
//!
//! Owns no transport and no process: it's a pure in-memory store plus the
//! event enum the facade fans out to subscribers, kept ordered the same
//! way the agent emitted the underlying `session/update` notifications.

mod error;
mod events;
mod store;

pub use error::SessionError;
pub use events::{ConsumerEvent, FileChange, PermissionEventOption};
pub use store::{MessageRecord, MessageRole, SessionRecord, SessionStore, Timestamp, ToolCallRecord};

#![forbid(unsafe_code)]
//! Wire codec and message model for the Agent Client Protocol: the JSON-RPC
//! 2.0 envelope, its id space and standard error codes, and the
//! discriminated `session/update` payload an agent streams mid-prompt.
//!
//! This crate has no knowledge of transports, processes, or capability
//! providers — it only turns bytes into typed messages and back.

mod envelope;
mod error;
mod session_update;

pub use envelope::{
    decode_frame, encode_frame, Classified, Envelope, ErrorObject, RequestId, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, UNPARSEABLE_ID,
    MAX_FRAME_BYTES,
};
pub use error::WireError;
pub use session_update::{
    AvailableCommand, CommandInput, ContentBlock, PlanEntry, PlanEntryPriority, PlanEntryStatus,
    SessionUpdate, ToolCallContentItem, ToolCallFields, ToolCallKind, ToolCallLocation,
    ToolCallStatus,
};

/// `session/update` notification params: `{sessionId, update}`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdateParams {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub update: SessionUpdate,
}

/// Protocol method names used by this client. Grouped here rather than
/// scattered across call sites, matching the donor's `METHOD_*` constants in
/// `mcp/protocol.rs`.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const SESSION_NEW: &str = "session/new";
    pub const SESSION_LOAD: &str = "session/load";
    pub const SESSION_PROMPT: &str = "session/prompt";
    pub const SESSION_CANCEL: &str = "session/cancel";
    pub const SESSION_SET_MODE: &str = "session/setMode";
    pub const SESSION_UPDATE: &str = "session/update";
    pub const REQUEST_PERMISSION: &str = "requestPermission";
    pub const FS_READ_TEXT_FILE: &str = "fs/readTextFile";
    pub const FS_WRITE_TEXT_FILE: &str = "fs/writeTextFile";
    pub const TERMINAL_CREATE: &str = "terminal/create";
    pub const TERMINAL_OUTPUT: &str = "terminal/output";
    pub const TERMINAL_WAIT: &str = "terminal/waitForExit";
    pub const TERMINAL_KILL: &str = "terminal/kill";
    pub const TERMINAL_RELEASE: &str = "terminal/release";
}

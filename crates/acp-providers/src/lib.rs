#![forbid(unsafe_code)]
//! Concrete capability providers: the filesystem reader/writer, the
//! terminal pool, and the permission bridge the agent calls back into.
//!
//! Depends on `acp-client` only for the trait seams (`FilesystemProvider`,
//! `TerminalProvider`, `PermissionProvider`) and shared request/response
//! shapes — never on the transport or the connection manager directly.

mod error;
mod filesystem;
mod permission;
mod terminal;

pub use error::ProviderError;
pub use filesystem::FileSystemProvider;
pub use permission::PermissionBridge;
pub use terminal::{TerminalPool, DEFAULT_OUTPUT_BYTE_LIMIT};

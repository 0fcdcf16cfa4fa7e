#![forbid(unsafe_code)]
//! Correlates outbound JSON-RPC calls with their responses, dispatches
//! inbound calls from the agent to capability providers, and owns the set
//! of live connections.
//!
//! Built on top of `acp-transport` (framing) and `acp-wire` (message
//! shapes); knows nothing about how a prompt's content is rendered or
//! stored — that's `acp-session`'s job, one layer up.

mod client;
mod error;
mod inbound;
mod pending;
mod providers;
pub mod types;

pub mod manager;

pub use client::{ConnectionEvent, ProtocolClient, DEFAULT_TIMEOUT};
pub use error::{ClientError, DomainError};
pub use inbound::{Capabilities, DispatchError, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND};
pub use manager::ConnectionManager;
pub use providers::{FilesystemProvider, PermissionProvider, TerminalProvider};

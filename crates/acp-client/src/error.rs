use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Errors surfaced while driving the protocol client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] acp_transport::TransportError),
    #[error("agent did not respond to initialize: {0}")]
    Handshake(String),
    #[error("agent returned JSON-RPC error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<Value>,
    },
    #[error("call was cancelled")]
    Cancelled,
    #[error("call timed out after {0:?}")]
    Timeout(Duration),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("response channel closed unexpectedly")]
    ChannelClosed,
    #[error("no agent named `{0}` is configured")]
    UnknownAgent(String),
    #[error("no connection with id `{0}`")]
    UnknownConnection(String),
}

/// Error surfaced by a capability provider handling an inbound request.
/// Always mapped to JSON-RPC code -32603 with `message` as the error text.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DomainError {
    pub message: String,
}

impl DomainError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::new(err.to_string())
    }
}

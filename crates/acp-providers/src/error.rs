use acp_client::DomainError;
use thiserror::Error;

/// Errors internal to a capability provider, convertible into the
/// `DomainError` the inbound dispatcher maps to JSON-RPC code -32603.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no terminal with id `{0}`")]
    UnknownTerminal(String),
    #[error("failed to spawn terminal command: {0}")]
    Spawn(#[from] acp_transport::TransportError),
}

impl From<ProviderError> for DomainError {
    fn from(err: ProviderError) -> Self {
        DomainError::new(err.to_string())
    }
}

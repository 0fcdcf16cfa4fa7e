use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("child stdio was not piped: {0}")]
    MissingStdio(&'static str),
    #[error("transport is closed")]
    Closed,
    #[error("transport was already started")]
    AlreadyStarted,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] acp_wire::WireError),
}

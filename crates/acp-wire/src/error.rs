use thiserror::Error;

/// Errors raised while decoding or encoding a single wire frame.
///
/// None of these should ever abort a reader loop — callers log and skip the
/// offending frame, the same way the donor's `reader_task` swallows a
/// per-line `serde_json::Error` with `tracing::warn!` and keeps reading.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to parse JSON-RPC frame: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("frame of {size} bytes exceeds the {limit} byte line limit")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("unrecognized sessionUpdate discriminator: {0}")]
    UnknownSessionUpdate(String),
    #[error("message is neither a request, a notification, nor a response")]
    Unclassifiable,
}

use thiserror::Error;

/// Errors surfaced by the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session with id `{0}`")]
    NotFound(String),
    #[error("no tool call with id `{0}` in session `{1}`")]
    ToolCallNotFound(String, String),
}

use async_trait::async_trait;

use crate::error::AcpError;

/// Shows a native directory picker and returns the chosen path, or `None`
/// if the user cancelled. Platform UI, not implemented by this crate —
/// [`NullDirectoryPicker`] is a standalone-usable stand-in that always
/// cancels; a GUI shell supplies a real one.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    async fn pick_directory(&self, start_dir: Option<String>) -> Result<Option<String>, AcpError>;
}

#[derive(Default)]
pub struct NullDirectoryPicker;

impl NullDirectoryPicker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryPicker for NullDirectoryPicker {
    async fn pick_directory(&self, _start_dir: Option<String>) -> Result<Option<String>, AcpError> {
        Ok(None)
    }
}

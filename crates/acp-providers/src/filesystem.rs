use std::sync::Mutex as StdMutex;
use std::time::{SystemTime, UNIX_EPOCH};

use acp_client::types::{
    ReadTextFileParams, ReadTextFileResult, WriteTextFileParams, WriteTextFileResult,
};
use acp_client::{DomainError, FilesystemProvider};
use acp_session::{ConsumerEvent, FileChange};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::error::ProviderError;

/// No single line read by `read_text_file` may exceed this many bytes.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Scans `path` line by line rather than loading it whole, bailing out if
/// any single line exceeds [`MAX_LINE_BYTES`].
async fn read_bounded(path: &str) -> std::io::Result<String> {
    let file = fs::File::open(path).await?;
    let mut reader = BufReader::new(file);
    let mut content = String::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.read_until(b'\n', &mut line).await?;
        if read == 0 {
            break;
        }
        if line.len() > MAX_LINE_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("line exceeds {MAX_LINE_BYTES}-byte limit in `{path}`"),
            ));
        }
        content.push_str(&String::from_utf8_lossy(&line));
    }
    Ok(content)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Reads and writes text files on behalf of the agent, recording every
/// write in an append-only log and emitting a `file:changed` event for it.
pub struct FileSystemProvider {
    agent_name: String,
    changes: StdMutex<Vec<FileChange>>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
}

impl FileSystemProvider {
    pub fn new(agent_name: impl Into<String>, events: mpsc::UnboundedSender<ConsumerEvent>) -> Self {
        Self {
            agent_name: agent_name.into(),
            changes: StdMutex::new(Vec::new()),
            events,
        }
    }

    /// Snapshot of every write recorded so far, oldest first.
    pub fn changes(&self) -> Vec<FileChange> {
        self.changes.lock().expect("file change log poisoned").clone()
    }

    /// Selects `content`'s 1-based `line` through `line + limit - 1`
    /// (`limit == 0` meaning "to end"), joining with `\n` and adding a
    /// trailing `\n` only when the selection reaches the file's last line.
    fn select_lines(content: &str, line: Option<i64>, limit: Option<u32>) -> String {
        if content.is_empty() {
            return String::new();
        }
        let lines: Vec<&str> = content.split('\n').collect();
        // `split` on a trailing `\n` yields a spurious empty last element;
        // drop it so "line count" matches what a reader would call a line.
        let lines: &[&str] = match lines.last() {
            Some(&"") => &lines[..lines.len() - 1],
            _ => &lines[..],
        };
        if lines.is_empty() {
            return String::new();
        }

        let start = match line {
            Some(n) if n > 0 => (n as usize) - 1,
            _ => 0,
        };
        if start >= lines.len() {
            return String::new();
        }
        let end = match limit {
            Some(0) | None => lines.len(),
            Some(n) => (start + n as usize).min(lines.len()),
        };

        let selected = &lines[start..end];
        let mut joined = selected.join("\n");
        if end == lines.len() {
            joined.push('\n');
        }
        joined
    }
}

#[async_trait]
impl FilesystemProvider for FileSystemProvider {
    async fn read_text_file(
        &self,
        params: ReadTextFileParams,
    ) -> Result<ReadTextFileResult, DomainError> {
        let content = read_bounded(&params.path).await.map_err(ProviderError::Io)?;
        let selected = Self::select_lines(&content, params.line, params.limit);
        Ok(ReadTextFileResult { content: selected })
    }

    async fn write_text_file(
        &self,
        params: WriteTextFileParams,
    ) -> Result<WriteTextFileResult, DomainError> {
        let old_content = fs::read_to_string(&params.path).await.unwrap_or_default();

        let path = std::path::Path::new(&params.path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(ProviderError::Io)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let _ = fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755)).await;
                }
            }
        }

        fs::write(path, &params.content).await.map_err(ProviderError::Io)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await;
        }

        let change = FileChange {
            path: params.path.clone(),
            old_content,
            new_content: params.content.clone(),
            timestamp: now_millis(),
            session_id: Some(params.session_id.clone()),
            agent_name: Some(self.agent_name.clone()),
        };
        self.changes.lock().expect("file change log poisoned").push(change.clone());
        let _ = self.events.send(ConsumerEvent::FileChanged { change });

        Ok(WriteTextFileResult {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_lines_defaults_to_start_of_file() {
        let content = "a\nb\nc\n";
        assert_eq!(FileSystemProvider::select_lines(content, None, None), "a\nb\nc\n");
    }

    #[test]
    fn select_lines_middle_slice_has_no_trailing_newline() {
        let content = "a\nb\nc\n";
        assert_eq!(FileSystemProvider::select_lines(content, Some(2), Some(1)), "b");
    }

    #[test]
    fn select_lines_past_eof_is_empty() {
        let content = "a\nb\n";
        assert_eq!(FileSystemProvider::select_lines(content, Some(50), None), "");
    }

    #[test]
    fn select_lines_nonpositive_defaults_to_first_line() {
        let content = "a\nb\n";
        assert_eq!(FileSystemProvider::select_lines(content, Some(0), Some(1)), "a");
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.txt");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let provider = FileSystemProvider::new("test-agent", tx);

        provider
            .write_text_file(WriteTextFileParams {
                session_id: "s1".into(),
                path: path.to_string_lossy().into_owned(),
                content: "hello\nworld\n".into(),
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "file:changed");

        let result = provider
            .read_text_file(ReadTextFileParams {
                session_id: "s1".into(),
                path: path.to_string_lossy().into_owned(),
                line: Some(1),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(result.content, "hello\nworld\n");
    }
}

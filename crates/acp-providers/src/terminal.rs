use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use acp_client::types::{
    TerminalCreateParams, TerminalCreateResult, TerminalExitStatus, TerminalIdParams,
    TerminalOutputResult,
};
use acp_client::{DomainError, TerminalProvider};
use acp_session::ConsumerEvent;
use acp_transport::spawn_with_retry;
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ProviderError;

/// Output buffers never grow past this without an explicit limit.
pub const DEFAULT_OUTPUT_BYTE_LIMIT: u64 = 1024 * 1024;

struct TerminalHandle {
    id: String,
    command: String,
    byte_limit: u64,
    buffer: Mutex<Vec<u8>>,
    truncated: AtomicBool,
    exit_status: Mutex<Option<TerminalExitStatus>>,
    // A `watch` channel latches its last value, so a subscriber that
    // arrives after the exit was already recorded still observes it
    // immediately — unlike `Notify::notify_waiters`, which only wakes
    // waiters already registered at the moment it fires.
    exited: watch::Sender<bool>,
    pid: Mutex<Option<u32>>,
}

impl TerminalHandle {
    fn has_exited(&self) -> bool {
        *self.exited.borrow()
    }

    /// Waits until the terminal exits, or returns immediately if it
    /// already has.
    async fn wait_exited(&self) {
        let mut rx = self.exited.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    async fn append(&self, chunk: &[u8]) {
        let mut buffer = self.buffer.lock().await;
        buffer.extend_from_slice(chunk);
        if buffer.len() as u64 > self.byte_limit {
            let overflow = buffer.len() as u64 - self.byte_limit;
            buffer.drain(0..overflow as usize);
            self.truncated.store(true, Ordering::SeqCst);
        }
    }
}

/// Pool of terminals spawned on the agent's behalf. Each terminal merges
/// its stdout and stderr into one bounded buffer; the observer callback
/// fires once per chunk read from either stream.
pub struct TerminalPool {
    terminals: Mutex<HashMap<String, Arc<TerminalHandle>>>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
}

impl TerminalPool {
    pub fn new(events: mpsc::UnboundedSender<ConsumerEvent>) -> Self {
        Self {
            terminals: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Releases every terminal still in the pool. Used during connection
    /// teardown.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.terminals.lock().await.keys().cloned().collect();
        for id in ids {
            let _ = self
                .release(TerminalIdParams {
                    session_id: String::new(),
                    terminal_id: id,
                })
                .await;
        }
    }
}

#[async_trait]
impl TerminalProvider for TerminalPool {
    async fn create(
        &self,
        params: TerminalCreateParams,
    ) -> Result<TerminalCreateResult, DomainError> {
        let mut command = Command::new(&params.command);
        command
            .args(&params.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &params.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &params.env {
            command.env(key, value);
        }

        let binary = PathBuf::from(&params.command);
        let mut child = spawn_with_retry(&mut command, &binary)
            .await
            .map_err(ProviderError::Spawn)?;

        let id = Uuid::new_v4().to_string();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let pid = child.id();

        let (exited_tx, _) = watch::channel(false);
        let handle = Arc::new(TerminalHandle {
            id: id.clone(),
            command: params.command.clone(),
            byte_limit: params.output_byte_limit.unwrap_or(DEFAULT_OUTPUT_BYTE_LIMIT),
            buffer: Mutex::new(Vec::new()),
            truncated: AtomicBool::new(false),
            exit_status: Mutex::new(None),
            exited: exited_tx,
            pid: Mutex::new(pid),
        });

        self.terminals.lock().await.insert(id.clone(), handle.clone());

        if let Some(stdout) = stdout {
            tokio::spawn(output_pump(stdout, handle.clone(), self.events.clone()));
        }
        if let Some(stderr) = stderr {
            tokio::spawn(stderr_pump(stderr, handle.clone(), self.events.clone()));
        }
        tokio::spawn(waiter(child, handle));

        Ok(TerminalCreateResult { terminal_id: id })
    }

    async fn output(&self, params: TerminalIdParams) -> Result<TerminalOutputResult, DomainError> {
        let handle = self.handle(&params.terminal_id).await?;
        let buffer = handle.buffer.lock().await;
        let output = String::from_utf8_lossy(&buffer).into_owned();
        let exit_status = handle.exit_status.lock().await.clone();
        Ok(TerminalOutputResult {
            output,
            truncated: handle.truncated.load(Ordering::SeqCst),
            exit_status,
        })
    }

    async fn wait_for_exit(
        &self,
        params: TerminalIdParams,
    ) -> Result<TerminalExitStatus, DomainError> {
        let handle = self.handle(&params.terminal_id).await?;
        handle.wait_exited().await;
        Ok(handle
            .exit_status
            .lock()
            .await
            .clone()
            .unwrap_or(TerminalExitStatus {
                exit_code: None,
                signal: None,
            }))
    }

    async fn kill(&self, params: TerminalIdParams) -> Result<(), DomainError> {
        let handle = match self.terminals.lock().await.get(&params.terminal_id).cloned() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        if handle.has_exited() {
            return Ok(());
        }

        let pid = *handle.pid.lock().await;
        if let Some(pid) = pid {
            send_signal(pid, nix::sys::signal::Signal::SIGTERM);
        }

        let terminated = time::timeout(Duration::from_secs(5), handle.wait_exited()).await;
        if terminated.is_err() && !handle.has_exited() {
            if let Some(pid) = pid {
                send_signal(pid, nix::sys::signal::Signal::SIGKILL);
            }
            handle.wait_exited().await;
        }
        Ok(())
    }

    async fn release(&self, params: TerminalIdParams) -> Result<(), DomainError> {
        self.kill(TerminalIdParams {
            session_id: params.session_id.clone(),
            terminal_id: params.terminal_id.clone(),
        })
        .await?;
        self.terminals.lock().await.remove(&params.terminal_id);
        Ok(())
    }
}

impl TerminalPool {
    async fn handle(&self, terminal_id: &str) -> Result<Arc<TerminalHandle>, DomainError> {
        self.terminals
            .lock()
            .await
            .get(terminal_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownTerminal(terminal_id.to_string()).into())
    }
}

fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
    use nix::unistd::Pid;
    if let Err(err) = nix::sys::signal::kill(Pid::from_raw(pid as i32), signal) {
        debug!("failed to send {signal:?} to pid {pid}: {err}");
    }
}

async fn output_pump(
    mut stdout: ChildStdout,
    handle: Arc<TerminalHandle>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
) {
    let mut buf = [0u8; 4096];
    loop {
        match stdout.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                handle.append(&buf[..n]).await;
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                let _ = events.send(ConsumerEvent::TerminalOutput {
                    terminal_id: handle.id.clone(),
                    chunk,
                });
            }
        }
    }
}

async fn stderr_pump(
    mut stderr: ChildStderr,
    handle: Arc<TerminalHandle>,
    events: mpsc::UnboundedSender<ConsumerEvent>,
) {
    let mut buf = [0u8; 4096];
    loop {
        match stderr.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                handle.append(&buf[..n]).await;
                let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                let _ = events.send(ConsumerEvent::TerminalOutput {
                    terminal_id: handle.id.clone(),
                    chunk,
                });
            }
        }
    }
}

async fn waiter(mut child: tokio::process::Child, handle: Arc<TerminalHandle>) {
    let status = child.wait().await;
    let exit_status = match status {
        Ok(status) => TerminalExitStatus {
            exit_code: status.code(),
            signal: signal_name(&status),
        },
        Err(err) => {
            warn!(
                terminal = handle.id,
                command = handle.command,
                "failed waiting for terminal child: {err}"
            );
            TerminalExitStatus {
                exit_code: None,
                signal: None,
            }
        }
    };
    *handle.exit_status.lock().await = Some(exit_status);
    let _ = handle.exited.send(true);
}

#[cfg(unix)]
fn signal_name(status: &std::process::ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(|sig| format!("SIG{sig}"))
}

#[cfg(not(unix))]
fn signal_name(_status: &std::process::ExitStatus) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output_and_exit_status() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TerminalPool::new(tx);
        let created = pool
            .create(TerminalCreateParams {
                session_id: "s1".into(),
                command: "/bin/echo".into(),
                args: vec!["hello".into()],
                env: Default::default(),
                cwd: None,
                output_byte_limit: None,
            })
            .await
            .unwrap();

        let status = pool
            .wait_for_exit(TerminalIdParams {
                session_id: "s1".into(),
                terminal_id: created.terminal_id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(status.exit_code, Some(0));

        let output = pool
            .output(TerminalIdParams {
                session_id: "s1".into(),
                terminal_id: created.terminal_id,
            })
            .await
            .unwrap();
        assert_eq!(output.output.trim_end(), "hello");
    }

    #[tokio::test]
    async fn output_buffer_truncates_from_the_head() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TerminalPool::new(tx);
        let created = pool
            .create(TerminalCreateParams {
                session_id: "s1".into(),
                command: "/bin/sh".into(),
                args: vec!["-c".into(), "printf 'ABCDEFGHIJ'".into()],
                env: Default::default(),
                cwd: None,
                output_byte_limit: Some(8),
            })
            .await
            .unwrap();

        pool.wait_for_exit(TerminalIdParams {
            session_id: "s1".into(),
            terminal_id: created.terminal_id.clone(),
        })
        .await
        .unwrap();

        let output = pool
            .output(TerminalIdParams {
                session_id: "s1".into(),
                terminal_id: created.terminal_id,
            })
            .await
            .unwrap();
        assert_eq!(output.output, "CDEFGHIJ");
        assert!(output.truncated);
    }

    #[tokio::test]
    async fn kill_is_idempotent_after_exit() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TerminalPool::new(tx);
        let created = pool
            .create(TerminalCreateParams {
                session_id: "s1".into(),
                command: "/bin/sh".into(),
                args: vec!["-c".into(), "exit 0".into()],
                env: Default::default(),
                cwd: None,
                output_byte_limit: None,
            })
            .await
            .unwrap();

        pool.wait_for_exit(TerminalIdParams {
            session_id: "s1".into(),
            terminal_id: created.terminal_id.clone(),
        })
        .await
        .unwrap();

        pool.kill(TerminalIdParams {
            session_id: "s1".into(),
            terminal_id: created.terminal_id,
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_terminal_output_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let pool = TerminalPool::new(tx);
        let result = pool
            .output(TerminalIdParams {
                session_id: "s1".into(),
                terminal_id: "nope".into(),
            })
            .await;
        assert!(result.is_err());
    }
}

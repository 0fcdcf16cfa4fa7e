#![forbid(unsafe_code)]
//! Subprocess transport for the Agent Client Protocol: spawns an agent
//! binary over piped stdio, frames newline-delimited JSON-RPC messages in
//! both directions, fans stderr out to an observer, and drains the child on
//! shutdown without ever leaving a zombie behind.
//!
//! This crate knows nothing about JSON-RPC semantics beyond framing — id
//! correlation and method dispatch live one layer up, in `acp-client`.

mod error;
mod spawn;

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use acp_wire::{decode_frame, encode_frame, Envelope};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use error::TransportError;
pub use spawn::spawn_with_retry;

/// Capacity of the stderr fan-out queue. Once full, new lines are dropped
/// rather than applying backpressure to the reader loop.
pub const STDERR_QUEUE_CAPACITY: usize = 256;

/// Everything needed to launch an agent subprocess.
#[derive(Clone, Debug)]
pub struct ChildConfig {
    pub command: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub cwd: Option<PathBuf>,
}

type FrameHandler = dyn Fn(Envelope) + Send + Sync;

struct Shared {
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    handler: RwLock<Option<Arc<FrameHandler>>>,
    stderr_tx: mpsc::Sender<String>,
    stderr_rx: Mutex<Option<mpsc::Receiver<String>>>,
    child: Mutex<Option<Child>>,
    closed: AtomicBool,
    exit_status: Mutex<Option<std::process::ExitStatus>>,
}

struct Tasks {
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    stderr: JoinHandle<()>,
    waiter: JoinHandle<()>,
}

/// A spawned agent subprocess speaking newline-delimited JSON-RPC over
/// stdio. Construction (`spawn`) and starting the I/O pumps (`start`) are
/// separate steps so a caller can register a frame handler before the first
/// line is ever read.
pub struct StdioTransport {
    shared: Arc<Shared>,
    stdout: Mutex<Option<ChildStdout>>,
    stdin: Mutex<Option<ChildStdin>>,
    stderr: Mutex<Option<ChildStderr>>,
    writer_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    tasks: Mutex<Option<Tasks>>,
}

impl StdioTransport {
    /// Spawns the child process and captures its stdio, but does not yet
    /// start pumping frames — call [`StdioTransport::start`] once handlers
    /// are wired.
    pub async fn spawn(config: ChildConfig) -> Result<Self, TransportError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &config.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &config.env {
            command.env(key, value);
        }

        let mut child = spawn_with_retry(&mut command, &config.command).await?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingStdio("stdout"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or(TransportError::MissingStdio("stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TransportError::MissingStdio("stderr"))?;

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::channel(STDERR_QUEUE_CAPACITY);

        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(writer_tx)),
            handler: RwLock::new(None),
            stderr_tx,
            stderr_rx: Mutex::new(Some(stderr_rx)),
            child: Mutex::new(Some(child)),
            closed: AtomicBool::new(false),
            exit_status: Mutex::new(None),
        });

        Ok(Self {
            shared,
            stdout: Mutex::new(Some(stdout)),
            stdin: Mutex::new(Some(stdin)),
            stderr: Mutex::new(Some(stderr)),
            writer_rx: Mutex::new(Some(writer_rx)),
            tasks: Mutex::new(None),
        })
    }

    /// Registers the single handler invoked (in wire order) for every
    /// decoded inbound frame. Replaces any previously set handler.
    pub async fn set_handler(&self, handler: impl Fn(Envelope) + Send + Sync + 'static) {
        *self.shared.handler.write().await = Some(Arc::new(handler));
    }

    /// Takes ownership of the stderr line stream. May only be called once;
    /// subsequent calls return `None`.
    pub async fn take_stderr(&self) -> Option<mpsc::Receiver<String>> {
        self.shared.stderr_rx.lock().await.take()
    }

    /// Starts the reader, writer, stderr-fanout, and exit-watcher tasks.
    /// Returns an error if called more than once.
    pub async fn start(&self) -> Result<(), TransportError> {
        let stdout = self
            .stdout
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyStarted)?;
        let stdin = self
            .stdin
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyStarted)?;
        let stderr = self
            .stderr
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyStarted)?;
        let writer_rx = self
            .writer_rx
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let tasks = Tasks {
            writer: tokio::spawn(writer_task(stdin, writer_rx)),
            reader: tokio::spawn(reader_task(stdout, self.shared.clone())),
            stderr: tokio::spawn(stderr_task(stderr, self.shared.clone())),
            waiter: tokio::spawn(waiter_task(self.shared.clone())),
        };
        *self.tasks.lock().await = Some(tasks);

        Ok(())
    }

    /// Writes one frame to the child's stdin. Fails fast with
    /// [`TransportError::Closed`] once `close` has been called, even if the
    /// write channel technically could still accept one more message.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let line = encode_frame(envelope)?;
        let guard = self.shared.writer.lock().await;
        match guard.as_ref() {
            Some(tx) => tx.send(line).map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Returns the child's exit status, if it has exited.
    pub async fn exit_status(&self) -> Option<std::process::ExitStatus> {
        *self.shared.exit_status.lock().await
    }

    /// Graceful shutdown: close stdin, wait for the reader to observe EOF,
    /// wait for the child to exit, then close the stderr stream. Idempotent
    /// — a second call is a no-op.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self
            .shared
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        // Dropping our clone of the writer sender ends `writer_task`'s recv
        // loop, which shuts down the child's stdin.
        self.shared.writer.lock().await.take();

        if let Some(tasks) = self.tasks.lock().await.take() {
            let _ = tasks.writer.await;
            let _ = tasks.reader.await;
            let _ = tasks.waiter.await;
            let _ = tasks.stderr.await;
        }

        Ok(())
    }
}

async fn writer_task(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        if stdin.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
    let _ = stdin.shutdown().await;
}

async fn reader_task(stdout: ChildStdout, shared: Arc<Shared>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match decode_frame(&line) {
                Ok(Some(envelope)) => {
                    let handler = shared.handler.read().await.clone();
                    if let Some(handler) = handler {
                        handler(envelope);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!("dropping malformed frame from agent stdout: {err}"),
            },
            Ok(None) => break,
            Err(err) => {
                warn!("error reading agent stdout: {err}");
                break;
            }
        }
    }
}

async fn stderr_task(stderr: ChildStderr, shared: Arc<Shared>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if shared.stderr_tx.try_send(line).is_err() {
            debug!("stderr fan-out queue full; dropping line");
        }
    }
}

async fn waiter_task(shared: Arc<Shared>) {
    let child = shared.child.lock().await.take();
    if let Some(mut child) = child {
        let status = child.wait().await.ok();
        *shared.exit_status.lock().await = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh_command(script: &str) -> ChildConfig {
        ChildConfig {
            command: PathBuf::from("/bin/sh"),
            args: vec![OsString::from("-c"), OsString::from(script)],
            env: Vec::new(),
            cwd: None,
        }
    }

    #[tokio::test]
    async fn echoes_a_line_back_to_handler() {
        let transport = StdioTransport::spawn(sh_command("cat")).await.unwrap();
        let received = Arc::new(Mutex::new(Vec::<Envelope>::new()));
        let received_clone = received.clone();
        transport
            .set_handler(move |envelope| {
                let received_clone = received_clone.clone();
                tokio::spawn(async move {
                    received_clone.lock().await.push(envelope);
                });
            })
            .await;
        transport.start().await.unwrap();

        let request = Envelope::request(1, "initialize", serde_json::json!({}));
        transport.send(&request).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let guard = received.lock().await;
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0].id, Some(1));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let transport = StdioTransport::spawn(sh_command("cat")).await.unwrap();
        transport.set_handler(|_| {}).await;
        transport.start().await.unwrap();
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_after_close_fails_fast() {
        let transport = StdioTransport::spawn(sh_command("cat")).await.unwrap();
        transport.set_handler(|_| {}).await;
        transport.start().await.unwrap();
        transport.close().await.unwrap();

        let request = Envelope::request(1, "initialize", serde_json::json!({}));
        assert!(matches!(
            transport.send(&request).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn stderr_lines_are_fanned_out() {
        let transport = StdioTransport::spawn(sh_command(
            "echo on-stderr 1>&2; cat >/dev/null",
        ))
        .await
        .unwrap();
        transport.set_handler(|_| {}).await;
        let mut stderr_rx = transport.take_stderr().await.unwrap();
        transport.start().await.unwrap();

        let line = tokio::time::timeout(std::time::Duration::from_secs(2), stderr_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(line, "on-stderr");
        let _ = transport.close().await;
    }

    #[tokio::test]
    async fn reports_exit_status_after_child_exits() {
        let transport = StdioTransport::spawn(sh_command("exit 0")).await.unwrap();
        transport.set_handler(|_| {}).await;
        transport.start().await.unwrap();
        transport.close().await.unwrap();
        let status = transport.exit_status().await.expect("child should have exited");
        assert!(status.success());
    }

    #[tokio::test]
    async fn take_stderr_returns_none_second_time() {
        let transport = StdioTransport::spawn(sh_command("cat")).await.unwrap();
        assert!(transport.take_stderr().await.is_some());
        assert!(transport.take_stderr().await.is_none());
        let _ = transport.close().await;
    }
}

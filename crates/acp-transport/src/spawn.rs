use std::path::Path;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::error::TransportError;

/// Spawns `command`, retrying a handful of times with capped exponential
/// backoff when the OS reports the executable as transiently busy
/// (`ETXTBSY`) — an updater that just overwrote the agent binary in place
/// can leave it briefly unexecutable. Any other spawn failure is returned
/// immediately.
pub async fn spawn_with_retry(command: &mut Command, binary: &Path) -> Result<Child, TransportError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(TransportError::Spawn {
                    command: binary.display().to_string(),
                    source,
                });
            }
        }
    }
    unreachable!("spawn_with_retry should return before exhausting retries")
}

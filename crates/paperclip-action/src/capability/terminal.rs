//! Shell command execution with output caps, timeout, and cancellation.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CapabilityResult, CommandOutput, TerminalCapability};
use crate::error::CapabilityError;

/// How long to wait for the output readers once the process is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Exit code reported when the process was killed or has no status code.
const KILLED_EXIT_CODE: i32 = 1;

pub struct LocalTerminal {
    default_timeout: Duration,
    output_cap: usize,
}

impl LocalTerminal {
    pub fn new(default_timeout: Duration, output_cap: usize) -> Self {
        Self {
            default_timeout,
            output_cap,
        }
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }
}

#[derive(Clone, Copy)]
enum Completion {
    Exited(Option<i32>),
    TimedOut,
    Cancelled,
}

/// Read the stream to EOF, keeping at most `cap` bytes. Bytes past the cap
/// are still drained so the child never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, cap: usize) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut output = Vec::new();
    let mut buffer = [0u8; 4096];
    loop {
        let read = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Output stream closed with error");
                break;
            }
        };
        let remaining = cap.saturating_sub(output.len());
        if remaining > 0 {
            output.extend_from_slice(&buffer[..remaining.min(read)]);
        }
    }
    output
}

fn spawn_reader<R>(reader: Option<R>, cap: usize) -> Option<JoinHandle<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|r| tokio::spawn(read_capped(r, cap)))
}

async fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            warn!(error = %e, "Output reader task failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

#[async_trait]
impl TerminalCapability for LocalTerminal {
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> CapabilityResult<CommandOutput> {
        let timeout = timeout.unwrap_or(self.default_timeout);

        let mut child = Self::shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CapabilityError::Spawn(format!("{}: {}", command, e)))?;

        let stdout = spawn_reader(child.stdout.take(), self.output_cap);
        let stderr = spawn_reader(child.stderr.take(), self.output_cap);

        let completion = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => Completion::Exited(status.code()),
                Err(e) => {
                    warn!(error = %e, command, "Failed to wait for command");
                    Completion::Exited(None)
                }
            },
            _ = tokio::time::sleep(timeout) => Completion::TimedOut,
            _ = cancel.cancelled() => Completion::Cancelled,
        };

        let (exit_code, timed_out, cancelled) = match completion {
            Completion::Exited(code) => (code.unwrap_or(KILLED_EXIT_CODE), false, false),
            Completion::TimedOut | Completion::Cancelled => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, command, "Failed to kill command");
                }
                let timed_out = matches!(completion, Completion::TimedOut);
                debug!(command, timed_out, "Command stopped before exit");
                (KILLED_EXIT_CODE, timed_out, !timed_out)
            }
        };

        Ok(CommandOutput {
            stdout: collect(stdout).await,
            stderr: collect(stderr).await,
            exit_code,
            timed_out,
            cancelled,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn terminal() -> LocalTerminal {
        LocalTerminal::new(Duration::from_secs(10), 1024)
    }

    #[tokio::test]
    async fn test_echo() {
        let out = terminal()
            .run("echo hello", None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, 0);
        assert!(!out.timed_out && !out.cancelled);
    }

    #[tokio::test]
    async fn test_nonzero_exit_and_stderr() {
        let out = terminal()
            .run("echo oops >&2; exit 3", None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.exit_code, 3);
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[tokio::test]
    async fn test_timeout_kills() {
        let out = terminal()
            .run("sleep 5", Some(Duration::from_millis(100)), CancellationToken::new())
            .await
            .unwrap();
        assert!(out.timed_out);
        assert_eq!(out.exit_code, 1);
    }

    #[tokio::test]
    async fn test_cancel_kills() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        let out = terminal().run("sleep 5", None, token).await.unwrap();
        assert!(out.cancelled);
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let out = LocalTerminal::new(Duration::from_secs(10), 16)
            .run("head -c 5000 /dev/zero | tr '\\0' 'a'", None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.stdout.len(), 16);
        assert_eq!(out.exit_code, 0);
    }
}

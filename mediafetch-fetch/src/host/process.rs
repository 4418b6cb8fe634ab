//! Subprocess execution for command-line extractors.
//!
//! Every run is bounded by a timeout and a cancellation token. On unix the
//! child leads its own process group. When either limit fires the whole
//! group is killed, so helpers the tool spawned (ffmpeg) die with it, and
//! the child is reaped before the call returns. `kill_on_drop` covers
//! callers that drop the future instead.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

// ============================================================================
// Process Output
// ============================================================================

/// Output from a process execution.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Standard output content.
    pub stdout: String,
    /// Standard error content.
    pub stderr: String,
    /// Exit code (0 = success).
    pub exit_code: i32,
    /// How long the command took to execute.
    pub duration: Duration,
}

impl ProcessOutput {
    /// Returns true if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// API for running subprocesses.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Run a command that is killed on timeout or when `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::NotFound`] if `cmd` cannot be resolved.
    /// - [`ProcessError::Timeout`] / [`ProcessError::Cancelled`] after the
    ///   child has been killed.
    /// - [`ProcessError::Io`] if spawning or waiting fails.
    ///
    /// A non-zero exit is not an error here; inspect [`ProcessOutput`].
    #[instrument(skip(self, args, cancel), fields(cmd = %cmd, timeout = ?timeout))]
    pub async fn run_cancellable(
        &self,
        cmd: &str,
        args: &[String],
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!(args = ?args, "Running command");

        let cmd_path = self.which(cmd).ok_or_else(|| {
            warn!(cmd = %cmd, "Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }

        let start = Instant::now();

        let mut command = Command::new(&cmd_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        let mut child = command.spawn()?;

        let stdout = tokio::spawn(drain(child.stdout.take()));
        let stderr = tokio::spawn(drain(child.stderr.take()));

        let status = tokio::select! {
            status = child.wait() => status?,
            () = cancel.cancelled() => {
                kill(&mut child, cmd).await;
                return Err(ProcessError::Cancelled);
            }
            () = tokio::time::sleep(timeout) => {
                warn!(cmd = %cmd, timeout = ?timeout, "Command timed out");
                kill(&mut child, cmd).await;
                return Err(ProcessError::Timeout(timeout));
            }
        };

        let duration = start.elapsed();
        let exit_code = status.code().unwrap_or(-1);

        let result = ProcessOutput {
            stdout: stdout.await.unwrap_or_default(),
            stderr: stderr.await.unwrap_or_default(),
            exit_code,
            duration,
        };

        debug!(
            exit_code = exit_code,
            duration = ?duration,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "Command completed"
        );

        Ok(result)
    }

    /// Check if a command exists on PATH (or as an explicit path).
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Find the path to a command.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }
}

/// Kills `child` and its process group, then waits for it so no zombie
/// is left behind.
async fn kill(child: &mut Child, cmd: &str) {
    let pid = child.id();
    #[cfg(unix)]
    if let Some(pid) = pid {
        kill_group(pid, cmd);
    }
    match child.kill().await {
        Ok(()) => debug!(cmd = %cmd, pid = ?pid, "Killed child process"),
        Err(e) => warn!(cmd = %cmd, pid = ?pid, error = %e, "Failed to kill child process"),
    }
}

#[cfg(unix)]
fn kill_group(pid: u32, cmd: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(cmd = %cmd, pid, "Process id out of range");
        return;
    };
    match killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => debug!(cmd = %cmd, pgid = raw, "Killed process group"),
        Err(e) => debug!(cmd = %cmd, pgid = raw, error = %e, "Failed to kill process group"),
    }
}

async fn drain<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!(error = %e, "Failed to read child output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

// ============================================================================
// Tests
// ============================================================================

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, warn};

use crate::types::{CommandOutput, ExecutionError, Result};

/// Bytes of each stream surfaced to callers
pub const TAIL_BYTES: usize = 2000;

/// Bytes of each stream kept in memory while the command runs
const CAPTURE_LIMIT: usize = 64 * 1024;

/// How long to keep draining pipes after the command exits; a background
/// grandchild may hold them open indefinitely
const DRAIN_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Command executor runs a single command with a timeout in its own process
/// group and captures the tail of its output
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    /// Maximum time to wait for command completion
    pub timeout: Duration,
    /// Working directory for command execution, inherited when unset
    pub working_dir: Option<String>,
}

impl CommandExecutor {
    pub fn new<P: AsRef<Path>>(timeout: Duration, working_dir: Option<P>) -> Self {
        Self {
            timeout,
            working_dir: working_dir.map(|dir| dir.as_ref().to_string_lossy().to_string()),
        }
    }

    /// Execute a command, returning its captured output on exit status 0
    pub async fn execute(&self, command: &[String]) -> Result<CommandOutput> {
        let Some((executable, args)) = command.split_first() else {
            return Err(ExecutionError::StartFailed {
                command: "<empty>".to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Command cannot be empty",
                ),
            }
            .into());
        };
        let command_line = command.join(" ");

        debug!(
            command = ?command,
            working_dir = ?self.working_dir,
            timeout_secs = self.timeout.as_secs(),
            "Executing command"
        );

        let mut cmd = Command::new(executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let start_time = Instant::now();
        let mut child = cmd.spawn().map_err(|source| {
            error!(command = %command_line, error = %source, "Failed to start command");
            ExecutionError::StartFailed {
                command: command_line.clone(),
                source,
            }
        })?;

        let mut group_guard = GroupKillGuard::new(&child);

        let stdout_task = tokio::spawn(capture_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(capture_stream(child.stderr.take()));

        let status = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                group_guard.disarm();
                status
            }
            Ok(Err(source)) => {
                kill_process_group(&mut child).await;
                group_guard.disarm();
                stdout_task.abort();
                stderr_task.abort();
                return Err(ExecutionError::StartFailed {
                    command: command_line,
                    source,
                }
                .into());
            }
            Err(_) => {
                warn!(
                    command = %command_line,
                    timeout_secs = self.timeout.as_secs(),
                    "Command timed out, killing process group"
                );
                kill_process_group(&mut child).await;
                group_guard.disarm();
                stdout_task.abort();
                stderr_task.abort();
                return Err(ExecutionError::Timeout {
                    command: command_line,
                    timeout: self.timeout.as_secs(),
                }
                .into());
            }
        };

        let stdout = drain(stdout_task).await;
        let stderr = drain(stderr_task).await;
        let duration_ms = start_time.elapsed().as_millis() as u64;
        let exit_code = status.code();

        debug!(
            command = %command_line,
            exit_code = ?exit_code,
            duration_ms = duration_ms,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "Command completed"
        );

        let output = CommandOutput {
            command: command.to_vec(),
            exit_code,
            stdout,
            stderr,
            duration_ms,
        };

        if !output.success() {
            let stderr_tail = tail_text(&output.stderr, TAIL_BYTES);
            warn!(
                command = %command_line,
                exit_code = ?exit_code,
                stderr = %stderr_tail,
                "Command failed"
            );
            return Err(ExecutionError::NonZeroExit {
                command: command_line,
                code: exit_code,
                stdout_tail: tail_text(&output.stdout, TAIL_BYTES),
                stderr_tail,
            }
            .into());
        }

        Ok(output)
    }
}

/// Read a pipe to EOF, keeping at most the last `CAPTURE_LIMIT` bytes
async fn capture_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let Some(mut stream) = stream else {
        return Vec::new();
    };

    let mut captured = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                captured.extend_from_slice(&chunk[..n]);
                if captured.len() > 2 * CAPTURE_LIMIT {
                    captured.drain(..captured.len() - CAPTURE_LIMIT);
                }
            }
            Err(e) => {
                debug!(error = %e, "Output stream read failed");
                break;
            }
        }
    }

    if captured.len() > CAPTURE_LIMIT {
        captured.drain(..captured.len() - CAPTURE_LIMIT);
    }
    captured
}

async fn drain(task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    let abort = task.abort_handle();
    match timeout(DRAIN_GRACE_PERIOD, task).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            debug!(error = %e, "Output capture task failed");
            Vec::new()
        }
        Err(_) => {
            debug!("Output pipe still open after exit, giving up on it");
            abort.abort();
            Vec::new()
        }
    }
}

/// SIGKILLs the process group if the execution future is dropped before the
/// child has been reaped
struct GroupKillGuard {
    pgid: Option<libc::pid_t>,
}

impl GroupKillGuard {
    fn new(child: &Child) -> Self {
        // process_group(0) makes the child's pid its pgid
        Self {
            pgid: child.id().map(|pid| pid as libc::pid_t),
        }
    }

    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            warn!(pgid = pgid, "Command abandoned while running, killing process group");
            // tokio's orphan reaper collects the child once it is dead
            let _ = signal_group(pgid);
        }
    }
}

fn signal_group(pgid: libc::pid_t) -> std::io::Result<()> {
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// SIGKILL the child's whole process group, then reap the child
async fn kill_process_group(child: &mut Child) {
    if let Some(pid) = child.id() {
        // The child was spawned with process_group(0), so its pid is the pgid
        if let Err(e) = signal_group(pid as libc::pid_t) {
            warn!(pid = pid, error = %e, "Failed to signal process group");
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Child already gone");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "Failed to reap killed child");
    }
}

/// Last `limit` bytes of `bytes` as text, never starting mid-character
pub fn tail_text(bytes: &[u8], limit: usize) -> String {
    let mut start = bytes.len().saturating_sub(limit);
    while start < bytes.len() && bytes[start] & 0xC0 == 0x80 {
        start += 1;
    }
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

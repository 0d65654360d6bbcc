//! Shell-command collaborator.
//!
//! Command-substitution placeholders (`{{>cmd}}` and `{{>>cmd}}`) run
//! through the [`CommandRunner`] capability. The default implementation
//! shells out through `sh -c` (or `cmd /C` on Windows) with a hard
//! timeout; tests swap in fakes.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Errors from shell-command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command exited with a non-zero status.
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// The command did not finish within the configured timeout.
    Timeout { command: String, timeout_ms: u64 },

    /// The command could not be spawned or its output could not be read.
    Io { command: String, message: String },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Failed {
                command,
                status,
                stderr,
            } => {
                write!(f, "Command '{}' failed", command)?;
                if let Some(code) = status {
                    write!(f, " with exit code {}", code)?;
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            CommandError::Timeout {
                command,
                timeout_ms,
            } => {
                write!(f, "Command '{}' timed out after {}ms", command, timeout_ms)
            }
            CommandError::Io { command, message } => {
                write!(f, "Command '{}' could not run: {}", command, message)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Capability for running a shell command and capturing its stdout.
///
/// Implementations return stdout with trailing newlines trimmed and fail
/// with [`CommandError`] on non-zero exit or timeout.
pub trait CommandRunner {
    fn run(&self, command: &str, timeout: Duration) -> Result<String, CommandError>;
}

/// The system shell implementation of [`CommandRunner`].
#[derive(Debug, Default)]
pub struct SystemShell;

impl SystemShell {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemShell {
    fn run(&self, command: &str, timeout: Duration) -> Result<String, CommandError> {
        let io_err = |e: std::io::Error| CommandError::Io {
            command: command.to_string(),
            message: e.to_string(),
        };

        let mut child = shell_command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(io_err)?;

        // Drain the pipes on helper threads so a chatty child cannot
        // deadlock against a full pipe buffer while we poll for exit.
        let stdout_handle = child.stdout.take().map(spawn_reader);
        let stderr_handle = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait().map_err(io_err)? {
                Some(status) => break status,
                None => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(CommandError::Timeout {
                            command: command.to_string(),
                            timeout_ms: timeout.as_millis() as u64,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        };

        let stdout = join_reader(stdout_handle);
        let stderr = join_reader(stderr_handle);

        if !status.success() {
            return Err(CommandError::Failed {
                command: command.to_string(),
                status: status.code(),
                stderr: trim_trailing_newline(&stderr).to_string(),
            });
        }

        Ok(trim_trailing_newline(&stdout).to_string())
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

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Strips trailing `\n` / `\r\n` from command output.
pub fn trim_trailing_newline(text: &str) -> &str {
    text.trim_end_matches(['\n', '\r'])
}

//! Subprocess execution seam for the speech recognizer.
//!
//! The `CommandExecutor` trait enables full testability without spawning
//! real processes.

use crate::error::{Result, VoxrelayError};
use std::process::Command;

/// Captured output of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, or `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// True when the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
/// Spawn failures are reported as errors; a nonzero exit status is returned
/// inside [`CommandOutput`] for the caller to interpret.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments and wait for it to finish.
    fn execute(&self, command: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VoxrelayError::RecognizerNotFound {
                    path: command.to_string(),
                }
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                VoxrelayError::Recognition {
                    message: format!("Permission denied executing {}: {}", command, e),
                }
            } else {
                VoxrelayError::Recognition {
                    message: format!("Failed to execute {}: {}", command, e),
                }
            }
        })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Mock command executor for testing.
///
/// Records all executions and returns configured outputs in order. When the
/// queue is exhausted it reports a successful run with empty output.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCommandExecutor {
    calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
    responses: std::sync::Mutex<std::collections::VecDeque<Result<CommandOutput>>>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a finished-process response.
    pub fn with_output(self, status: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.lock().unwrap().push_back(Ok(CommandOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }));
        self
    }

    /// Queue a spawn failure.
    pub fn with_error(self, error: VoxrelayError) -> Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Get a specific call by index.
    pub fn call(&self, index: usize) -> Option<(String, Vec<String>)> {
        self.calls.lock().unwrap().get(index).cloned()
    }
}

#[cfg(test)]
impl CommandExecutor for MockCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push((
            command.to_string(),
            args.iter().map(|s| s.to_string()).collect(),
        ));

        self.responses.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(CommandOutput {
                status: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        })
    }
}

//! Result of a single remote command execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable capture of one executed command. Stdout and stderr are
/// recorded verbatim; truncation is a policy decision for callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandResult {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub completed_at: DateTime<Utc>,
}

impl CommandResult {
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            completed_at: Utc::now(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

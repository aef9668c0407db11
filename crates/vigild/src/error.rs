//! Error types for the audit daemon.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using the daemon error
pub type Result<T> = std::result::Result<T, AuditError>;

/// Audit daemon error taxonomy.
///
/// Connection and Prerequisite errors are fatal to the audit that hit
/// them but never to the daemon; per-command failures in the fallback
/// collection path are captured as dataset error markers and do not
/// surface here at all.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("No active session: {session_id}")]
    NoActiveSession { session_id: Uuid },

    #[error("Command timed out after {timeout_secs}s: {command}")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error("Prerequisite not met: {0}")]
    Prerequisite(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Audit {0} already finished")]
    AlreadyFinished(Uuid),

    #[error("Analysis service error: {0}")]
    Analysis(String),

    #[error("Audit cancelled")]
    Cancelled,
}

impl AuditError {
    pub fn connection(reason: impl Into<String>) -> Self {
        AuditError::Connection {
            reason: reason.into(),
        }
    }
}

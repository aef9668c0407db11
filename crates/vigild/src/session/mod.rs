//! Session lifecycle: connect, execute, disconnect, idle reaping.
//!
//! The registry is the only resource shared across concurrent audits.
//! Sessions are keyed by a generated id; callers never hold a live
//! reference into the table, they go through the registry by id.

pub mod transport;

use crate::config::VigilConfig;
use crate::error::{AuditError, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use transport::{Connector, SessionTransport};
use uuid::Uuid;
use vigil_common::{CommandResult, Target};

/// One live session entry.
struct Session {
    target_id: Uuid,
    transport: Arc<dyn SessionTransport>,
    connected_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

/// Owns all live sessions. connect/execute/disconnect plus periodic
/// idle reaping to bound growth from abandoned sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
    connector: Arc<dyn Connector>,
    connect_timeout_secs: u64,
    command_timeout_secs: u64,
}

impl SessionRegistry {
    pub fn new(connector: Arc<dyn Connector>, config: &VigilConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            connector,
            connect_timeout_secs: config.connect_timeout_secs,
            command_timeout_secs: config.command_timeout_secs,
        }
    }

    /// Establish a remote execution context and register it under a
    /// fresh session id. Concurrent audits against the same target each
    /// get their own session; there is no per-target pooling.
    pub async fn connect(&self, target: &Target) -> Result<Uuid> {
        let transport = self
            .connector
            .connect(target, self.connect_timeout_secs)
            .await?;

        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let session = Session {
            target_id: target.id,
            transport,
            connected_at: now,
            last_activity: now,
        };

        self.sessions.write().await.insert(session_id, session);
        info!("Session {} opened to {} ({})", session_id, target.name, target.addr());
        Ok(session_id)
    }

    /// Run a command on an open session. Bumps last_activity whether
    /// the command succeeds or fails: a failed command is still a sign
    /// of liveness.
    pub async fn execute(&self, session_id: Uuid, command: &str) -> Result<CommandResult> {
        self.execute_with_timeout(session_id, command, self.command_timeout_secs)
            .await
    }

    /// Like `execute` but with a caller-supplied timeout (the collection
    /// script run needs a longer bound than a single diagnostic command).
    pub async fn execute_with_timeout(
        &self,
        session_id: Uuid,
        command: &str,
        timeout_secs: u64,
    ) -> Result<CommandResult> {
        // Clone the transport handle out so the table lock is not held
        // across the remote round trip.
        let transport = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(&session_id)
                .ok_or(AuditError::NoActiveSession { session_id })?;
            Arc::clone(&session.transport)
        };

        let result = transport.exec(command, timeout_secs).await;

        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.last_activity = Utc::now();
        }

        result
    }

    /// Close and remove a session. Idempotent; unknown ids are a no-op.
    pub async fn disconnect(&self, session_id: Uuid) {
        let removed = self.sessions.write().await.remove(&session_id);
        if let Some(session) = removed {
            session.transport.close().await;
            info!("Session {} closed", session_id);
        }
    }

    /// Disconnect sessions idle longer than `max_idle_secs`; returns
    /// the number reaped.
    pub async fn reap_idle(&self, max_idle_secs: u64) -> usize {
        let cutoff = Utc::now() - ChronoDuration::seconds(max_idle_secs as i64);

        let stale: Vec<Uuid> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, s)| s.last_activity < cutoff)
                .map(|(id, _)| *id)
                .collect()
        };

        for session_id in &stale {
            warn!("Reaping idle session {}", session_id);
            self.disconnect(*session_id).await;
        }
        stale.len()
    }

    pub async fn open_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Target a session belongs to, if it is still open.
    pub async fn target_of(&self, session_id: Uuid) -> Option<Uuid> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|s| s.target_id)
    }

    /// Age of a session since connect, for diagnostics.
    pub async fn session_age_secs(&self, session_id: Uuid) -> Option<i64> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|s| (Utc::now() - s.connected_at).num_seconds())
    }

    #[cfg(test)]
    pub async fn backdate_activity(&self, session_id: Uuid, secs: i64) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.last_activity = Utc::now() - ChronoDuration::seconds(secs);
        }
    }
}

//! Progress payloads: the push update and the pull snapshot.

use crate::audit::{AuditPhase, AuditRecord, Scores};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One progress update pushed to subscribed observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub audit_id: Uuid,
    pub phase: AuditPhase,
    /// 0-100, non-decreasing per audit
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(audit_id: Uuid, phase: AuditPhase, progress: u8, message: impl Into<String>) -> Self {
        Self {
            audit_id,
            phase,
            progress,
            message: message.into(),
            eta_seconds: None,
            timestamp: Utc::now(),
        }
    }
}

/// Point-in-time snapshot of an audit, for push-less clients and late
/// subscribers catching up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStatus {
    pub id: Uuid,
    pub status: AuditPhase,
    pub progress: u8,
    pub current_step: String,
    pub start_time: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    pub findings_count: usize,
}

impl From<&AuditRecord> for AuditStatus {
    fn from(record: &AuditRecord) -> Self {
        Self {
            id: record.id,
            status: record.phase,
            progress: record.progress,
            current_step: record.message.clone(),
            start_time: record.started_at,
            last_update: record.finished_at.unwrap_or_else(Utc::now),
            scores: record.scores,
            findings_count: record.findings.len(),
        }
    }
}

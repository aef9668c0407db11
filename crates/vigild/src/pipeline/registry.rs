//! In-memory arena of audit records.
//!
//! Records are keyed by audit id; callers never hold a reference into
//! the table. All mutation funnels through methods that enforce the
//! two record invariants: progress never decreases, and a terminal
//! record is frozen.

use crate::error::{AuditError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use vigil_common::{
    AuditPhase, AuditRecord, AuditStatus, CollectedDataset, Finding, Scores,
};

pub struct AuditRegistry {
    audits: RwLock<HashMap<Uuid, AuditRecord>>,
    cancel_flags: RwLock<HashMap<Uuid, Arc<AtomicBool>>>,
}

impl AuditRegistry {
    pub fn new() -> Self {
        Self {
            audits: RwLock::new(HashMap::new()),
            cancel_flags: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a fresh record and allocate its cancellation flag.
    pub async fn insert(&self, record: AuditRecord) {
        let audit_id = record.id;
        self.audits.write().await.insert(audit_id, record);
        self.cancel_flags
            .write()
            .await
            .insert(audit_id, Arc::new(AtomicBool::new(false)));
    }

    /// Move a running audit to `phase`, updating message and progress.
    /// Progress is clamped to never decrease; mutating a terminal
    /// record is refused.
    pub async fn advance(
        &self,
        audit_id: Uuid,
        phase: AuditPhase,
        message: impl Into<String>,
    ) -> Result<u8> {
        let mut audits = self.audits.write().await;
        let record = audits
            .get_mut(&audit_id)
            .ok_or_else(|| AuditError::NotFound(format!("audit {audit_id}")))?;

        if record.is_terminal() {
            return Err(AuditError::AlreadyFinished(audit_id));
        }

        record.phase = phase;
        record.message = message.into();
        record.progress = record.progress.max(phase.checkpoint());
        Ok(record.progress)
    }

    /// Drive a record to its terminal phase and freeze it. Completed
    /// and failed land on 100; cancelled keeps the progress it had.
    pub async fn finish(
        &self,
        audit_id: Uuid,
        phase: AuditPhase,
        message: impl Into<String>,
    ) -> Result<AuditRecord> {
        debug_assert!(phase.is_terminal());
        let mut audits = self.audits.write().await;
        let record = audits
            .get_mut(&audit_id)
            .ok_or_else(|| AuditError::NotFound(format!("audit {audit_id}")))?;

        if !record.is_terminal() {
            record.phase = phase;
            record.message = message.into();
            if !matches!(phase, AuditPhase::Cancelled) {
                record.progress = 100;
            }
            let now = Utc::now();
            record.finished_at = Some(now);
            record.duration_secs = Some((now - record.started_at).num_seconds());
        }
        Ok(record.clone())
    }

    pub async fn set_dataset(&self, audit_id: Uuid, dataset: CollectedDataset) {
        let mut audits = self.audits.write().await;
        if let Some(record) = audits.get_mut(&audit_id).filter(|r| !r.is_terminal()) {
            record.dataset = Some(dataset);
        }
    }

    pub async fn set_findings(&self, audit_id: Uuid, findings: Vec<Finding>) {
        let mut audits = self.audits.write().await;
        if let Some(record) = audits.get_mut(&audit_id).filter(|r| !r.is_terminal()) {
            record.findings = findings;
        }
    }

    pub async fn set_scores(&self, audit_id: Uuid, scores: Scores) {
        let mut audits = self.audits.write().await;
        if let Some(record) = audits.get_mut(&audit_id).filter(|r| !r.is_terminal()) {
            record.scores = Some(scores);
        }
    }

    pub async fn set_analysis(&self, audit_id: Uuid, analysis: String) {
        let mut audits = self.audits.write().await;
        if let Some(record) = audits.get_mut(&audit_id).filter(|r| !r.is_terminal()) {
            record.analysis = Some(analysis);
        }
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<AuditRecord> {
        self.audits
            .read()
            .await
            .get(&audit_id)
            .cloned()
            .ok_or_else(|| AuditError::NotFound(format!("audit {audit_id}")))
    }

    /// Point-in-time status for the pull channel.
    pub async fn snapshot(&self, audit_id: Uuid) -> Result<AuditStatus> {
        self.audits
            .read()
            .await
            .get(&audit_id)
            .map(AuditStatus::from)
            .ok_or_else(|| AuditError::NotFound(format!("audit {audit_id}")))
    }

    pub async fn list(&self) -> Vec<AuditStatus> {
        let mut list: Vec<AuditStatus> = self
            .audits
            .read()
            .await
            .values()
            .map(AuditStatus::from)
            .collect();
        list.sort_by_key(|s| s.start_time);
        list
    }

    pub async fn running_count(&self) -> usize {
        self.audits
            .read()
            .await
            .values()
            .filter(|r| !r.is_terminal())
            .count()
    }

    /// Flag a running audit for cooperative cancellation. Returns false
    /// for unknown or already-terminal audits.
    pub async fn request_cancel(&self, audit_id: Uuid) -> bool {
        let audits = self.audits.read().await;
        let Some(record) = audits.get(&audit_id) else {
            return false;
        };
        if record.is_terminal() {
            return false;
        }
        if let Some(flag) = self.cancel_flags.read().await.get(&audit_id) {
            flag.store(true, Ordering::SeqCst);
            return true;
        }
        false
    }

    pub async fn is_cancelled(&self, audit_id: Uuid) -> bool {
        self.cancel_flags
            .read()
            .await
            .get(&audit_id)
            .map_or(false, |f| f.load(Ordering::SeqCst))
    }
}

impl Default for AuditRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fresh_audit(registry: &AuditRegistry) -> Uuid {
        let record = AuditRecord::new(Uuid::new_v4(), "qwen2.5:7b-instruct");
        let id = record.id;
        registry.insert(record).await;
        id
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let registry = AuditRegistry::new();
        let id = fresh_audit(&registry).await;

        let p1 = registry.advance(id, AuditPhase::Analyzing, "rules").await.unwrap();
        assert_eq!(p1, 40);
        // A phase with a lower checkpoint cannot pull progress back
        let p2 = registry.advance(id, AuditPhase::Connecting, "reconnect").await.unwrap();
        assert_eq!(p2, 40);
    }

    #[tokio::test]
    async fn test_terminal_record_is_frozen() {
        let registry = AuditRegistry::new();
        let id = fresh_audit(&registry).await;

        let record = registry.finish(id, AuditPhase::Completed, "done").await.unwrap();
        assert_eq!(record.progress, 100);
        assert!(record.finished_at.is_some());

        let err = registry
            .advance(id, AuditPhase::Gathering, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::AlreadyFinished(_)));

        // A second finish does not overwrite the first
        let again = registry
            .finish(id, AuditPhase::Failed, "late error")
            .await
            .unwrap();
        assert_eq!(again.phase, AuditPhase::Completed);
        assert_eq!(again.message, "done");
    }

    #[tokio::test]
    async fn test_cancelled_keeps_progress() {
        let registry = AuditRegistry::new();
        let id = fresh_audit(&registry).await;

        registry.advance(id, AuditPhase::Gathering, "collecting").await.unwrap();
        let record = registry.finish(id, AuditPhase::Cancelled, "cancelled").await.unwrap();
        assert_eq!(record.progress, 20);
        assert_eq!(record.phase, AuditPhase::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_flag_lifecycle() {
        let registry = AuditRegistry::new();
        let id = fresh_audit(&registry).await;

        assert!(!registry.is_cancelled(id).await);
        assert!(registry.request_cancel(id).await);
        assert!(registry.is_cancelled(id).await);

        // Unknown and terminal audits refuse cancellation
        assert!(!registry.request_cancel(Uuid::new_v4()).await);
        registry.finish(id, AuditPhase::Cancelled, "cancelled").await.unwrap();
        assert!(!registry.request_cancel(id).await);
    }

    #[tokio::test]
    async fn test_snapshot_not_found() {
        let registry = AuditRegistry::new();
        let err = registry.snapshot(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuditError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_snapshot_reflects_record() {
        let registry = AuditRegistry::new();
        let id = fresh_audit(&registry).await;
        registry.advance(id, AuditPhase::Scoring, "scoring").await.unwrap();

        let status = registry.snapshot(id).await.unwrap();
        assert_eq!(status.status, AuditPhase::Scoring);
        assert_eq!(status.progress, 60);
        assert_eq!(status.findings_count, 0);
    }
}

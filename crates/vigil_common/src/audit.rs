//! Audit records and the pipeline phase machine.

use crate::dataset::CollectedDataset;
use crate::finding::Finding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline phase. Each non-terminal phase carries a fixed progress
/// checkpoint; progress only ever moves forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditPhase {
    Starting,
    Validating,
    Connecting,
    Gathering,
    Analyzing,
    Scoring,
    AiAnalysis,
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl AuditPhase {
    /// Progress percentage reached when this phase begins.
    pub fn checkpoint(&self) -> u8 {
        match self {
            AuditPhase::Starting => 0,
            AuditPhase::Validating => 5,
            AuditPhase::Connecting => 10,
            AuditPhase::Gathering => 20,
            AuditPhase::Analyzing => 40,
            AuditPhase::Scoring => 60,
            AuditPhase::AiAnalysis => 80,
            AuditPhase::Finalizing => 95,
            AuditPhase::Completed | AuditPhase::Failed => 100,
            // Cancelled freezes progress where it stood
            AuditPhase::Cancelled => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AuditPhase::Completed | AuditPhase::Failed | AuditPhase::Cancelled
        )
    }
}

impl std::fmt::Display for AuditPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditPhase::Starting => "starting",
            AuditPhase::Validating => "validating",
            AuditPhase::Connecting => "connecting",
            AuditPhase::Gathering => "gathering",
            AuditPhase::Analyzing => "analyzing",
            AuditPhase::Scoring => "scoring",
            AuditPhase::AiAnalysis => "ai_analysis",
            AuditPhase::Finalizing => "finalizing",
            AuditPhase::Completed => "completed",
            AuditPhase::Failed => "failed",
            AuditPhase::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Numeric scores derived from finding severities, each 0-100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scores {
    pub overall: u8,
    pub security: u8,
    pub performance: u8,
    pub compliance: u8,
}

impl Default for Scores {
    fn default() -> Self {
        Self {
            overall: 100,
            security: 100,
            performance: 100,
            compliance: 100,
        }
    }
}

/// One run of the audit pipeline against one target. Mutated only by
/// the pipeline that owns it; frozen once in a terminal phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub target_id: Uuid,
    /// Requested analysis model name
    pub model: String,
    pub phase: AuditPhase,
    pub progress: u8,
    pub message: String,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<CollectedDataset>,
    /// Free-text analysis from the external model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
}

impl AuditRecord {
    pub fn new(target_id: Uuid, model: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id,
            model: model.into(),
            phase: AuditPhase::Starting,
            progress: 0,
            message: "Audit queued".to_string(),
            findings: Vec::new(),
            scores: None,
            dataset: None,
            analysis: None,
            started_at: Utc::now(),
            finished_at: None,
            duration_secs: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

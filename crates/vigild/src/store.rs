//! Flat-file persistence for finished audit records.

use crate::error::{AuditError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;
use vigil_common::AuditRecord;

/// Result-store collaborator consumed by the finalizing phase.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, record: &AuditRecord) -> Result<()>;
    async fn load_by_target(&self, target_id: Uuid) -> Result<Vec<AuditRecord>>;
}

/// One JSON file per audit under `<data_dir>/audits/`.
pub struct JsonResultStore {
    dir: PathBuf,
}

impl JsonResultStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("audits"),
        }
    }

    fn path_for(&self, audit_id: Uuid) -> PathBuf {
        self.dir.join(format!("{audit_id}.json"))
    }
}

#[async_trait]
impl ResultStore for JsonResultStore {
    async fn save(&self, record: &AuditRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AuditError::Persistence(format!("create {}: {e}", self.dir.display())))?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| AuditError::Persistence(e.to_string()))?;
        let path = self.path_for(record.id);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| AuditError::Persistence(format!("write {}: {e}", path.display())))?;

        info!("Persisted audit {} to {}", record.id, path.display());
        Ok(())
    }

    async fn load_by_target(&self, target_id: Uuid) -> Result<Vec<AuditRecord>> {
        let mut records = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            // No audits persisted yet
            Err(_) => return Ok(records),
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().map_or(true, |e| e != "json") {
                continue;
            }
            let Ok(bytes) = tokio::fs::read(&path).await else {
                continue;
            };
            if let Ok(record) = serde_json::from_slice::<AuditRecord>(&bytes) {
                if record.target_id == target_id {
                    records.push(record);
                }
            }
        }

        records.sort_by_key(|r| r.started_at);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vigil_common::AuditPhase;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path());

        let target_id = Uuid::new_v4();
        let mut record = AuditRecord::new(target_id, "qwen2.5:7b-instruct");
        record.phase = AuditPhase::Completed;
        record.progress = 100;
        store.save(&record).await.unwrap();

        let other = AuditRecord::new(Uuid::new_v4(), "qwen2.5:7b-instruct");
        store.save(&other).await.unwrap();

        let loaded = store.load_by_target(target_id).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, record.id);
        assert_eq!(loaded[0].phase, AuditPhase::Completed);
    }

    #[tokio::test]
    async fn test_load_from_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = JsonResultStore::new(dir.path());
        let loaded = store.load_by_target(Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_empty());
    }
}

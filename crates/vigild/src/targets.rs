//! Registered-target store: flat-file JSON, id-keyed.

use crate::error::{AuditError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_common::Target;

/// Owns the registered hosts. The audit core only ever reads targets;
/// registration and removal come from the operator API.
pub struct TargetStore {
    path: PathBuf,
    targets: RwLock<HashMap<Uuid, Target>>,
}

impl TargetStore {
    /// Load `targets.json` from the data directory, starting empty if
    /// it does not exist or fails to parse.
    pub async fn open(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join("targets.json");
        let targets = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<Target>>(&bytes) {
                Ok(list) => {
                    info!("Loaded {} targets from {}", list.len(), path.display());
                    list.into_iter().map(|t| (t.id, t)).collect()
                }
                Err(e) => {
                    warn!("Corrupt target store at {}: {}. Starting empty.", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            path,
            targets: RwLock::new(targets),
        }
    }

    async fn persist(&self, targets: &HashMap<Uuid, Target>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuditError::Persistence(e.to_string()))?;
        }
        let mut list: Vec<&Target> = targets.values().collect();
        list.sort_by_key(|t| t.registered_at);
        let json = serde_json::to_vec_pretty(&list)
            .map_err(|e| AuditError::Persistence(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuditError::Persistence(format!("write {}: {e}", self.path.display())))
    }

    pub async fn register(&self, target: Target) -> Result<Target> {
        let mut targets = self.targets.write().await;
        targets.insert(target.id, target.clone());
        self.persist(&targets).await?;
        info!("Registered target {} ({})", target.name, target.addr());
        Ok(target)
    }

    pub async fn get(&self, id: Uuid) -> Result<Target> {
        self.targets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| AuditError::NotFound(format!("target {id}")))
    }

    pub async fn list(&self) -> Vec<Target> {
        let mut list: Vec<Target> = self.targets.read().await.values().cloned().collect();
        list.sort_by_key(|t| t.registered_at);
        list
    }

    pub async fn remove(&self, id: Uuid) -> Result<()> {
        let mut targets = self.targets.write().await;
        if targets.remove(&id).is_none() {
            return Err(AuditError::NotFound(format!("target {id}")));
        }
        self.persist(&targets).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vigil_common::Credential;

    #[tokio::test]
    async fn test_register_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = TargetStore::open(dir.path()).await;

        let target = Target::new("web-01", "10.0.0.5", "auditor", Credential::Password("pw".into()));
        let id = target.id;
        store.register(target).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().name, "web-01");
        assert_eq!(store.list().await.len(), 1);

        store.remove(id).await.unwrap();
        assert!(matches!(store.get(id).await, Err(AuditError::NotFound(_))));
        assert!(matches!(store.remove(id).await, Err(AuditError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_targets_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let id = {
            let store = TargetStore::open(dir.path()).await;
            let target =
                Target::new("db-01", "10.0.0.9", "auditor", Credential::Password("pw".into()));
            let id = target.id;
            store.register(target).await.unwrap();
            id
        };

        let reopened = TargetStore::open(dir.path()).await;
        assert_eq!(reopened.get(id).await.unwrap().host, "10.0.0.9");
    }
}

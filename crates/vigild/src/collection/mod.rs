//! Two-tier data collection against an open session.
//!
//! Primary: push the bundled script through the session, run it, and
//! harvest the archive it announces. Fallback: walk the canonical
//! command table one entry at a time, tolerating individual failures.

pub mod commands;
pub mod script;

use crate::config::VigilConfig;
use crate::error::{AuditError, Result};
use crate::session::SessionRegistry;
use commands::FALLBACK_COMMANDS;
use tracing::{info, warn};
use uuid::Uuid;
use vigil_common::{CollectedDataset, CollectionMethod, Target};

pub struct CollectionStrategy<'a> {
    sessions: &'a SessionRegistry,
    script_timeout_secs: u64,
}

impl<'a> CollectionStrategy<'a> {
    pub fn new(sessions: &'a SessionRegistry, config: &VigilConfig) -> Self {
        Self {
            sessions,
            script_timeout_secs: config.script_timeout_secs,
        }
    }

    /// Collect diagnostic data from the target. Tries the scripted
    /// path first; any failure there drops to the per-command fallback.
    /// Only an unusable session propagates as an error.
    pub async fn collect(&self, session_id: Uuid, target: &Target) -> Result<CollectedDataset> {
        match self.collect_scripted(session_id, target).await {
            Ok(dataset) => Ok(dataset),
            Err(AuditError::NoActiveSession { session_id }) => {
                Err(AuditError::NoActiveSession { session_id })
            }
            Err(e) => {
                info!(
                    "Scripted collection unavailable for {} ({}), falling back to command table",
                    target.name, e
                );
                self.collect_fallback(session_id, target).await
            }
        }
    }

    /// Primary path: upload-and-run the bundled script, then inspect
    /// the archive it reports.
    async fn collect_scripted(&self, session_id: Uuid, target: &Target) -> Result<CollectedDataset> {
        let run = self
            .sessions
            .execute_with_timeout(
                session_id,
                &script::upload_and_run_command(),
                self.script_timeout_secs,
            )
            .await?;

        let archive = script::find_archive_name(&run.stdout).ok_or_else(|| {
            AuditError::connection(format!(
                "collection script produced no archive (exit {})",
                run.exit_code
            ))
        })?;

        info!("Collection script on {} produced {}", target.name, archive);

        let mut dataset =
            CollectedDataset::new(target.id, target.host.clone(), CollectionMethod::ScriptArchive);
        dataset.insert_ok("audit_script_result", run);

        match self
            .sessions
            .execute(session_id, &script::inspect_archive_command(&archive))
            .await
        {
            Ok(inspect) => dataset.insert_ok("archive_info", inspect),
            Err(e) => dataset.insert_error("archive_info", e.to_string()),
        }

        Ok(dataset)
    }

    /// Fallback path: one entry per table command. A failed command is
    /// recorded as an error marker for its category and never aborts
    /// the remaining entries.
    async fn collect_fallback(&self, session_id: Uuid, target: &Target) -> Result<CollectedDataset> {
        let mut dataset =
            CollectedDataset::new(target.id, target.host.clone(), CollectionMethod::CommandTable);

        for (category, command) in FALLBACK_COMMANDS {
            match self.sessions.execute(session_id, command).await {
                Ok(result) => {
                    dataset.insert_ok(*category, result);
                }
                Err(AuditError::NoActiveSession { session_id }) => {
                    // The session itself is gone; nothing further can run.
                    return Err(AuditError::NoActiveSession { session_id });
                }
                Err(e) => {
                    warn!("Collection of {} on {} failed: {}", category, target.name, e);
                    dataset.insert_error(*category, e.to_string());
                }
            }
        }

        info!(
            "Fallback collection on {}: {} categories, {} errors",
            target.name,
            dataset.categories.len(),
            dataset.error_count()
        );
        Ok(dataset)
    }
}

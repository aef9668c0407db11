//! The audit pipeline: a per-request state machine driven through
//! fixed phases with checkpointed progress.
//!
//! `start` returns immediately; the run itself is a spawned task. Any
//! error at any phase drives the record to `failed` with the error's
//! message; nothing propagates past the task boundary, so one audit's
//! failure never touches the daemon or other audits. Cancellation is
//! cooperative: a flag checked at every phase boundary.

pub mod registry;

use crate::broadcast::ProgressBroadcaster;
use crate::collection::CollectionStrategy;
use crate::config::VigilConfig;
use crate::error::{AuditError, Result};
use crate::ollama::AnalysisService;
use crate::session::SessionRegistry;
use crate::store::ResultStore;
use crate::targets::TargetStore;
use crate::analysis::{rules, scoring};
use registry::AuditRegistry;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use vigil_common::{AuditPhase, AuditRecord, ProgressUpdate, Target};

pub struct AuditPipeline {
    pub registry: Arc<AuditRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub broadcaster: Arc<ProgressBroadcaster>,
    pub analysis: Arc<dyn AnalysisService>,
    pub store: Arc<dyn ResultStore>,
    pub targets: Arc<TargetStore>,
    pub config: VigilConfig,
}

impl AuditPipeline {
    /// Allocate an audit record and schedule the run. The caller gets
    /// the audit id back without waiting on any phase.
    pub async fn start(self: &Arc<Self>, target_id: Uuid, model: Option<String>) -> Result<Uuid> {
        let target = self.targets.get(target_id).await?;
        let model = model.unwrap_or_else(|| self.config.default_model.clone());

        let record = AuditRecord::new(target_id, model);
        let audit_id = record.id;
        self.registry.insert(record).await;

        info!("Audit {} queued for target {} ({})", audit_id, target.name, target.addr());

        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.run(audit_id, target).await;
        });

        Ok(audit_id)
    }

    /// Request cooperative cancellation; honored at the next phase
    /// boundary the run reaches.
    pub async fn cancel(&self, audit_id: Uuid) -> bool {
        let accepted = self.registry.request_cancel(audit_id).await;
        if accepted {
            info!("Cancellation requested for audit {}", audit_id);
        }
        accepted
    }

    /// Outermost run boundary: converts every failure into a terminal
    /// record instead of letting it escape the task.
    async fn run(&self, audit_id: Uuid, target: Target) {
        let outcome = self.run_phases(audit_id, &target).await;

        let final_record = match outcome {
            Ok(message) => {
                info!("Audit {} completed", audit_id);
                self.registry
                    .finish(audit_id, AuditPhase::Completed, message)
                    .await
            }
            Err(AuditError::Cancelled) => {
                info!("Audit {} cancelled", audit_id);
                self.registry
                    .finish(audit_id, AuditPhase::Cancelled, "Audit cancelled by operator")
                    .await
            }
            Err(e) => {
                error!("Audit {} failed: {}", audit_id, e);
                self.registry
                    .finish(audit_id, AuditPhase::Failed, e.to_string())
                    .await
            }
        };

        if let Ok(record) = final_record {
            self.broadcaster
                .publish(ProgressUpdate::new(
                    audit_id,
                    record.phase,
                    record.progress,
                    record.message.clone(),
                ))
                .await;
        }
        self.broadcaster.close_audit(audit_id).await;
    }

    /// Runs every phase; the Ok value is the completion message for
    /// the terminal record (a non-fatal persistence failure rides
    /// along in it).
    async fn run_phases(&self, audit_id: Uuid, target: &Target) -> Result<String> {
        self.checkpoint(audit_id, AuditPhase::Validating, "Checking prerequisites")
            .await?;
        let record = self.registry.get(audit_id).await?;
        let models = self.analysis.list_models().await?;
        if !models.iter().any(|m| m == &record.model) {
            return Err(AuditError::Prerequisite(format!(
                "model '{}' is not available (advertised: {})",
                record.model,
                models.join(", ")
            )));
        }

        self.checkpoint(audit_id, AuditPhase::Connecting, "Opening session")
            .await?;
        let session_id = self.sessions.connect(target).await?;

        // The session opened for this audit is owned by this run alone
        // and is closed on every exit path below.
        let result = self.run_with_session(audit_id, target, session_id, &record.model).await;
        self.sessions.disconnect(session_id).await;
        result
    }

    async fn run_with_session(
        &self,
        audit_id: Uuid,
        target: &Target,
        session_id: Uuid,
        model: &str,
    ) -> Result<String> {
        self.checkpoint(audit_id, AuditPhase::Gathering, "Collecting diagnostic data")
            .await?;
        let strategy = CollectionStrategy::new(&self.sessions, &self.config);
        let dataset = strategy.collect(session_id, target).await?;
        self.registry.set_dataset(audit_id, dataset.clone()).await;

        self.checkpoint(audit_id, AuditPhase::Analyzing, "Evaluating findings")
            .await?;
        let findings = rules::evaluate(&dataset);
        info!("Audit {}: {} findings", audit_id, findings.len());
        self.registry.set_findings(audit_id, findings.clone()).await;

        self.checkpoint(audit_id, AuditPhase::Scoring, "Deriving scores")
            .await?;
        let scores = scoring::score(&findings);
        self.registry.set_scores(audit_id, scores).await;

        self.checkpoint(audit_id, AuditPhase::AiAnalysis, "Requesting model analysis")
            .await?;
        let analysis = self.analysis.analyze(&findings, model).await?;
        self.registry.set_analysis(audit_id, analysis).await;

        self.checkpoint(audit_id, AuditPhase::Finalizing, "Persisting results")
            .await?;
        let record = self.registry.get(audit_id).await?;
        if let Err(e) = self.store.save(&record).await {
            // Persistence failure does not undo the audit's outcome;
            // prior phases already stand. It does ride along in the
            // terminal message so the caller sees it.
            warn!("Audit {}: persistence failed: {}", audit_id, e);
            return Ok(format!("Audit completed (persistence failed: {e})"));
        }

        Ok("Audit completed".to_string())
    }

    /// Phase boundary: observe cancellation, advance the record, and
    /// push the update to observers.
    async fn checkpoint(
        &self,
        audit_id: Uuid,
        phase: AuditPhase,
        message: &str,
    ) -> Result<()> {
        if self.registry.is_cancelled(audit_id).await {
            return Err(AuditError::Cancelled);
        }
        let progress = self.registry.advance(audit_id, phase, message).await?;
        self.broadcaster
            .publish(ProgressUpdate::new(audit_id, phase, progress, message))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::fake::{FakeConnector, FakeTransport};
    use crate::store::JsonResultStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;
    use vigil_common::{Credential, Finding, Severity};

    /// Scripted analysis collaborator.
    struct FakeAnalysis {
        models: Vec<String>,
        delay_ms: u64,
        fail_analyze: AtomicBool,
    }

    impl FakeAnalysis {
        fn new() -> Self {
            Self {
                models: vec!["qwen2.5:7b-instruct".to_string()],
                delay_ms: 0,
                fail_analyze: AtomicBool::new(false),
            }
        }

        fn slow(mut self, delay_ms: u64) -> Self {
            self.delay_ms = delay_ms;
            self
        }
    }

    #[async_trait]
    impl AnalysisService for FakeAnalysis {
        async fn list_models(&self) -> Result<Vec<String>> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            Ok(self.models.clone())
        }

        async fn analyze(&self, findings: &[Finding], _model: &str) -> Result<String> {
            if self.fail_analyze.load(Ordering::SeqCst) {
                return Err(AuditError::Analysis("model backend crashed".into()));
            }
            Ok(format!("Assessment of {} findings.", findings.len()))
        }
    }

    /// Store whose saves always fail.
    struct FailingStore;

    #[async_trait]
    impl ResultStore for FailingStore {
        async fn save(&self, _record: &AuditRecord) -> Result<()> {
            Err(AuditError::Persistence("disk full".into()))
        }

        async fn load_by_target(&self, _target_id: Uuid) -> Result<Vec<AuditRecord>> {
            Ok(Vec::new())
        }
    }

    struct Fixture {
        pipeline: Arc<AuditPipeline>,
        target_id: Uuid,
        _data_dir: TempDir,
    }

    async fn fixture_with(transport: FakeTransport, analysis: FakeAnalysis) -> Fixture {
        let data_dir = TempDir::new().unwrap();
        let config = VigilConfig {
            data_dir: data_dir.path().to_path_buf(),
            ..VigilConfig::default()
        };

        let connector = FakeConnector::new();
        connector.push(Arc::new(transport));
        let sessions = Arc::new(SessionRegistry::new(Arc::new(connector), &config));

        let targets = Arc::new(TargetStore::open(data_dir.path()).await);
        let target = Target::new("web-01", "10.0.0.5", "auditor", Credential::Password("pw".into()));
        let target_id = target.id;
        targets.register(target).await.unwrap();

        let pipeline = Arc::new(AuditPipeline {
            registry: Arc::new(AuditRegistry::new()),
            sessions,
            broadcaster: Arc::new(ProgressBroadcaster::new()),
            analysis: Arc::new(analysis),
            store: Arc::new(JsonResultStore::new(data_dir.path())),
            targets,
            config,
        });

        Fixture {
            pipeline,
            target_id,
            _data_dir: data_dir,
        }
    }

    fn risky_transport() -> FakeTransport {
        FakeTransport::new()
            .fail("vigil_collect.sh", "script blocked by policy")
            .reply("sshd_config", "PermitRootLogin yes\nPasswordAuthentication yes")
            .reply("ufw", "Status: inactive")
            .default_stdout("ok")
    }

    async fn wait_terminal(pipeline: &AuditPipeline, audit_id: Uuid) -> AuditRecord {
        for _ in 0..200 {
            let record = pipeline.registry.get(audit_id).await.unwrap();
            if record.is_terminal() {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("audit {audit_id} never reached a terminal phase");
    }

    #[tokio::test]
    async fn test_full_run_completes_with_findings_and_scores() {
        let f = fixture_with(risky_transport(), FakeAnalysis::new()).await;
        let audit_id = f.pipeline.start(f.target_id, None).await.unwrap();

        let record = wait_terminal(&f.pipeline, audit_id).await;
        assert_eq!(record.phase, AuditPhase::Completed);
        assert_eq!(record.progress, 100);
        assert!(record.finished_at.is_some());

        // PermitRootLogin yes and an inactive firewall must surface
        let severities: Vec<Severity> = record.findings.iter().map(|f| f.severity).collect();
        assert!(severities.contains(&Severity::Critical));
        assert!(severities.contains(&Severity::High));

        let scores = record.scores.unwrap();
        assert!(scores.overall < 100);
        assert!(record.analysis.unwrap().contains("findings"));
        assert!(record.dataset.is_some());

        // Session closed, record persisted
        assert_eq!(f.pipeline.sessions.open_count().await, 0);
        let persisted = f.pipeline.store.load_by_target(f.target_id).await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn test_published_progress_is_monotonic_and_ends_at_100() {
        // The slow model listing holds the run in `validating` until
        // the subscription below is in place.
        let f = fixture_with(risky_transport(), FakeAnalysis::new().slow(100)).await;

        let audit_id = f.pipeline.start(f.target_id, None).await.unwrap();
        let (_sub, mut rx) = f.pipeline.broadcaster.subscribe(audit_id).await;

        wait_terminal(&f.pipeline, audit_id).await;

        let mut last = 0u8;
        let mut final_progress = 0u8;
        while let Ok(update) = rx.try_recv() {
            assert!(update.progress >= last, "progress went backwards");
            last = update.progress;
            final_progress = update.progress;
        }
        assert_eq!(final_progress, 100);
    }

    #[tokio::test]
    async fn test_unknown_model_fails_in_validation() {
        let f = fixture_with(risky_transport(), FakeAnalysis::new()).await;
        let audit_id = f
            .pipeline
            .start(f.target_id, Some("no-such-model".into()))
            .await
            .unwrap();

        let record = wait_terminal(&f.pipeline, audit_id).await;
        assert_eq!(record.phase, AuditPhase::Failed);
        assert!(record.message.contains("no-such-model"));
        // Never got as far as opening a session
        assert_eq!(f.pipeline.sessions.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_failure_is_fatal_to_the_audit() {
        let f = fixture_with(FakeTransport::new(), FakeAnalysis::new()).await;
        // Make every connect attempt fail
        let config = f.pipeline.config.clone();
        let connector = FakeConnector::new();
        connector.refuse_connections();
        let pipeline = Arc::new(AuditPipeline {
            sessions: Arc::new(SessionRegistry::new(Arc::new(connector), &config)),
            registry: Arc::clone(&f.pipeline.registry),
            broadcaster: Arc::clone(&f.pipeline.broadcaster),
            analysis: Arc::clone(&f.pipeline.analysis),
            store: Arc::clone(&f.pipeline.store),
            targets: Arc::clone(&f.pipeline.targets),
            config,
        });

        let audit_id = pipeline.start(f.target_id, None).await.unwrap();
        let record = wait_terminal(&pipeline, audit_id).await;
        assert_eq!(record.phase, AuditPhase::Failed);
        assert!(record.message.contains("Connection failed"));
    }

    #[tokio::test]
    async fn test_analysis_failure_fails_audit_but_closes_session() {
        let analysis = FakeAnalysis::new();
        analysis.fail_analyze.store(true, Ordering::SeqCst);
        let f = fixture_with(risky_transport(), analysis).await;

        let audit_id = f.pipeline.start(f.target_id, None).await.unwrap();
        let record = wait_terminal(&f.pipeline, audit_id).await;

        assert_eq!(record.phase, AuditPhase::Failed);
        assert!(record.message.contains("model backend crashed"));
        assert_eq!(f.pipeline.sessions.open_count().await, 0);
        // Findings from the phases that did run are retained
        assert!(!record.findings.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_surfaces_in_final_message() {
        let f = fixture_with(risky_transport(), FakeAnalysis::new()).await;
        let pipeline = Arc::new(AuditPipeline {
            store: Arc::new(FailingStore),
            registry: Arc::clone(&f.pipeline.registry),
            sessions: Arc::clone(&f.pipeline.sessions),
            broadcaster: Arc::clone(&f.pipeline.broadcaster),
            analysis: Arc::clone(&f.pipeline.analysis),
            targets: Arc::clone(&f.pipeline.targets),
            config: f.pipeline.config.clone(),
        });

        let audit_id = pipeline.start(f.target_id, None).await.unwrap();
        let record = wait_terminal(&pipeline, audit_id).await;

        // The audit still completes on the strength of the earlier
        // phases, but the save failure is visible in the final status.
        assert_eq!(record.phase, AuditPhase::Completed);
        assert!(record.message.contains("persistence failed"));
        assert!(record.message.contains("disk full"));
        assert!(!record.findings.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_observed_at_phase_boundary() {
        // Slow model listing keeps the run inside `validating` long
        // enough for the cancel request to land.
        let f = fixture_with(risky_transport(), FakeAnalysis::new().slow(300)).await;
        let audit_id = f.pipeline.start(f.target_id, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(f.pipeline.cancel(audit_id).await);

        let record = wait_terminal(&f.pipeline, audit_id).await;
        assert_eq!(record.phase, AuditPhase::Cancelled);
        assert!(record.progress < 100);
        assert_eq!(f.pipeline.sessions.open_count().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_audits_same_target_are_independent() {
        let f = fixture_with(risky_transport(), FakeAnalysis::new()).await;
        // The second audit gets a blank transport from the connector;
        // its fallback collection sees empty output, which is fine here.
        let a = f.pipeline.start(f.target_id, None).await.unwrap();
        let b = f.pipeline.start(f.target_id, None).await.unwrap();
        assert_ne!(a, b);

        let ra = wait_terminal(&f.pipeline, a).await;
        let rb = wait_terminal(&f.pipeline, b).await;
        assert_eq!(ra.phase, AuditPhase::Completed);
        assert_eq!(rb.phase, AuditPhase::Completed);
        assert_eq!(ra.progress, 100);
        assert_eq!(rb.progress, 100);
        assert_eq!(f.pipeline.sessions.open_count().await, 0);
    }
}

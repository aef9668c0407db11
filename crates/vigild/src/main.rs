//! Vigil Daemon - remote audit orchestration
//!
//! Registers targets, opens transient SSH sessions, runs the
//! multi-phase audit pipeline, and serves live progress to observers.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigild::broadcast::ProgressBroadcaster;
use vigild::config::VigilConfig;
use vigild::ollama::OllamaClient;
use vigild::pipeline::registry::AuditRegistry;
use vigild::pipeline::AuditPipeline;
use vigild::server::{self, AppState};
use vigild::session::transport::SshConnector;
use vigild::session::SessionRegistry;
use vigild::store::JsonResultStore;
use vigild::targets::TargetStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Vigil Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = VigilConfig::load();

    let sessions = Arc::new(SessionRegistry::new(Arc::new(SshConnector), &config));
    let targets = Arc::new(TargetStore::open(&config.data_dir).await);
    info!("{} targets registered", targets.list().await.len());

    let pipeline = Arc::new(AuditPipeline {
        registry: Arc::new(AuditRegistry::new()),
        sessions: Arc::clone(&sessions),
        broadcaster: Arc::new(ProgressBroadcaster::new()),
        analysis: Arc::new(OllamaClient::new(
            config.ollama_url.clone(),
            config.analysis_timeout_secs,
        )),
        store: Arc::new(JsonResultStore::new(&config.data_dir)),
        targets,
        config: config.clone(),
    });

    // Idle-session reaper: bounds growth from abandoned sessions
    {
        let sessions = Arc::clone(&sessions);
        let max_idle = config.session_max_idle_secs;
        let interval = config.reap_interval_secs;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                let reaped = sessions.reap_idle(max_idle).await;
                if reaped > 0 {
                    info!("Reaped {} idle sessions", reaped);
                }
            }
        });
    }

    info!("Vigil Daemon ready");
    server::run(AppState::new(pipeline), &config.listen_addr).await
}

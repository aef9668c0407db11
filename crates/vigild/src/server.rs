//! HTTP server for vigild

use crate::pipeline::AuditPipeline;
use crate::routes;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<AuditPipeline>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(pipeline: Arc<AuditPipeline>) -> Self {
        Self {
            pipeline,
            start_time: Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run(state: AppState, listen_addr: &str) -> Result<()> {
    let state = Arc::new(state);

    let app = Router::new()
        .merge(routes::target_routes())
        .merge(routes::audit_routes())
        .merge(routes::model_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    // Bind to localhost only for security
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("  Listening on http://{}", listen_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

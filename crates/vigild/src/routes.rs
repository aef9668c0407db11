//! API routes for vigild

use crate::error::AuditError;
use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, post},
    Json, Router,
};
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use uuid::Uuid;
use vigil_common::{
    AuditStatus, CancelResponse, HealthResponse, ListAuditsResponse, ListModelsResponse,
    ListTargetsResponse, RegisterTargetRequest, RegisterTargetResponse, StartAuditRequest,
    StartAuditResponse, Target,
};

type AppStateArc = Arc<AppState>;

fn error_response(e: AuditError) -> (StatusCode, String) {
    let status = match &e {
        AuditError::NotFound(_) => StatusCode::NOT_FOUND,
        AuditError::AlreadyFinished(_) => StatusCode::CONFLICT,
        AuditError::Prerequisite(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuditError::Connection { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

// ============================================================================
// Target Routes
// ============================================================================

pub fn target_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/targets", post(register_target).get(list_targets))
        .route("/v1/targets/:id", get(get_target).delete(remove_target))
}

async fn register_target(
    State(state): State<AppStateArc>,
    Json(req): Json<RegisterTargetRequest>,
) -> Result<Json<RegisterTargetResponse>, (StatusCode, String)> {
    let mut target = Target::new(req.name, req.host, req.username, req.credential);
    if let Some(port) = req.port {
        target.port = port;
    }

    let target = state
        .pipeline
        .targets
        .register(target)
        .await
        .map_err(error_response)?;

    Ok(Json(RegisterTargetResponse { target }))
}

async fn list_targets(State(state): State<AppStateArc>) -> Json<ListTargetsResponse> {
    Json(ListTargetsResponse {
        targets: state.pipeline.targets.list().await,
    })
}

async fn get_target(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<Target>, (StatusCode, String)> {
    let target = state.pipeline.targets.get(id).await.map_err(error_response)?;
    Ok(Json(target))
}

async fn remove_target(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .pipeline
        .targets
        .remove(id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Audit Routes
// ============================================================================

pub fn audit_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/audits", post(start_audit).get(list_audits))
        .route("/v1/audits/:id", get(audit_status))
        .route("/v1/audits/:id/cancel", post(cancel_audit))
        .route("/v1/audits/:id/events", get(audit_events))
}

async fn start_audit(
    State(state): State<AppStateArc>,
    Json(req): Json<StartAuditRequest>,
) -> Result<Json<StartAuditResponse>, (StatusCode, String)> {
    info!("  Starting audit for target {}", req.target_id);

    let audit_id = state
        .pipeline
        .start(req.target_id, req.model)
        .await
        .map_err(|e| {
            error!("  Audit start failed: {}", e);
            error_response(e)
        })?;

    Ok(Json(StartAuditResponse { audit_id }))
}

async fn list_audits(State(state): State<AppStateArc>) -> Json<ListAuditsResponse> {
    Json(ListAuditsResponse {
        audits: state.pipeline.registry.list().await,
    })
}

async fn audit_status(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditStatus>, (StatusCode, String)> {
    let status = state
        .pipeline
        .registry
        .snapshot(id)
        .await
        .map_err(error_response)?;
    Ok(Json(status))
}

async fn cancel_audit(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, (StatusCode, String)> {
    // Confirm the audit exists first so unknown ids are a 404, not a
    // silent `cancelled: false`
    state
        .pipeline
        .registry
        .snapshot(id)
        .await
        .map_err(error_response)?;

    let cancelled = state.pipeline.cancel(id).await;
    Ok(Json(CancelResponse {
        audit_id: id,
        cancelled,
    }))
}

/// Live progress stream. The first event is the current snapshot so
/// late subscribers catch up; updates published before the subscription
/// are not replayed.
async fn audit_events(
    State(state): State<AppStateArc>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)>
{
    // Subscribe before reading the snapshot: if the snapshot is still
    // live, the audit has not closed its observers yet, so this entry
    // is guaranteed a final cleanup.
    let (subscriber, rx) = state.pipeline.broadcaster.subscribe(id).await;

    let snapshot = match state.pipeline.registry.snapshot(id).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            state.pipeline.broadcaster.unsubscribe(id, subscriber).await;
            return Err(error_response(e));
        }
    };

    if snapshot.status.is_terminal() {
        // No further publishes will come for this id; dropping the
        // subscription here keeps finished audits from accumulating
        // dead senders. The stream ends after the snapshot event.
        state.pipeline.broadcaster.unsubscribe(id, subscriber).await;
    }

    let first_event = Event::default()
        .event("snapshot")
        .json_data(&snapshot)
        .unwrap_or_else(|_| Event::default().event("snapshot"));
    let first = tokio_stream::once(Ok::<Event, Infallible>(first_event));

    let updates = UnboundedReceiverStream::new(rx).map(|update| {
        Ok(Event::default()
            .event("progress")
            .json_data(&update)
            .unwrap_or_else(|_| Event::default().event("progress")))
    });

    Ok(Sse::new(first.chain(updates)).keep_alive(KeepAlive::default()))
}

// ============================================================================
// Model Routes
// ============================================================================

pub fn model_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/models", get(list_models))
}

async fn list_models(
    State(state): State<AppStateArc>,
) -> Result<Json<ListModelsResponse>, (StatusCode, String)> {
    let models = state
        .pipeline
        .analysis
        .list_models()
        .await
        .map_err(error_response)?;
    Ok(Json(ListModelsResponse { models }))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        open_sessions: state.pipeline.sessions.open_count().await,
        running_audits: state.pipeline.registry.running_count().await,
    })
}

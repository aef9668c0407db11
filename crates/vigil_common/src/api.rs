//! Request and response types for the vigild HTTP API.

use crate::progress::AuditStatus;
use crate::target::{Credential, Target};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTargetRequest {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    pub credential: Credential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterTargetResponse {
    pub target: Target,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTargetsResponse {
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAuditRequest {
    pub target_id: Uuid,
    /// Analysis model; daemon default applies when omitted
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAuditResponse {
    pub audit_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListAuditsResponse {
    pub audits: Vec<AuditStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub audit_id: Uuid,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListModelsResponse {
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub open_sessions: usize,
    pub running_audits: usize,
}

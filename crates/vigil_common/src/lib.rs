//! Shared types for the Vigil audit daemon and CLI.
//!
//! Everything that crosses the wire between `vigild` and `vigilctl`
//! lives here: targets, command results, datasets, findings, audit
//! records, and progress payloads.

pub mod api;
pub mod audit;
pub mod command;
pub mod dataset;
pub mod finding;
pub mod progress;
pub mod target;

pub use api::{
    CancelResponse, HealthResponse, ListAuditsResponse, ListModelsResponse, ListTargetsResponse,
    RegisterTargetRequest, RegisterTargetResponse, StartAuditRequest, StartAuditResponse,
};
pub use audit::{AuditPhase, AuditRecord, Scores};
pub use command::CommandResult;
pub use dataset::{CategoryResult, CollectedDataset, CollectionMethod};
pub use finding::{Finding, Severity};
pub use progress::{AuditStatus, ProgressUpdate};
pub use target::{Credential, Reachability, Target};

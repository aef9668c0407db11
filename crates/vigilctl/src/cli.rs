//! CLI - Command-line argument parsing
//!
//! Defines the CLI structure using clap. Keeps argument parsing
//! separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Vigil CLI
#[derive(Parser)]
#[command(name = "vigilctl")]
#[command(about = "Vigil - Remote Linux audit orchestration", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Daemon base URL (overrides $VIGILD_URL and the default)
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered targets
    Target {
        #[command(subcommand)]
        action: TargetCommands,
    },

    /// Run and inspect audits
    Audit {
        #[command(subcommand)]
        action: AuditCommands,
    },

    /// List analysis models the daemon can use
    Models,

    /// Show daemon health
    Health,
}

#[derive(Subcommand)]
pub enum TargetCommands {
    /// Register a host
    Add {
        /// Display name
        name: String,
        /// Hostname or IP
        host: String,
        /// SSH username
        #[arg(long)]
        user: String,
        /// SSH port
        #[arg(long, default_value_t = 22)]
        port: u16,
        /// Password authentication
        #[arg(long, conflicts_with = "key")]
        password: Option<String>,
        /// Private key file on the daemon host
        #[arg(long)]
        key: Option<PathBuf>,
    },

    /// List registered hosts
    List,

    /// Remove a host
    Remove { id: Uuid },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Start an audit against a target
    Start {
        target_id: Uuid,
        /// Analysis model (daemon default if omitted)
        #[arg(long)]
        model: Option<String>,
        /// Watch progress after starting
        #[arg(long)]
        watch: bool,
    },

    /// Show a point-in-time audit status
    Status { audit_id: Uuid },

    /// List all audits the daemon knows about
    List,

    /// Request cancellation of a running audit
    Cancel { audit_id: Uuid },

    /// Follow an audit's progress until it finishes
    Watch { audit_id: Uuid },
}

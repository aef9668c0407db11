//! vigilctl - CLI for the vigil audit daemon

mod cli;
mod client;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use client::DaemonClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::new(cli.url.as_deref())?;

    match cli.command {
        Commands::Target { action } => commands::run_target(&client, action).await,
        Commands::Audit { action } => commands::run_audit(&client, action).await,
        Commands::Models => commands::run_models(&client).await,
        Commands::Health => commands::run_health(&client).await,
    }
}

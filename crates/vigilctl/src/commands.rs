//! Command execution: talks to the daemon and renders output

use crate::cli::{AuditCommands, TargetCommands};
use crate::client::DaemonClient;
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;
use vigil_common::api::RegisterTargetRequest;
use vigil_common::target::Credential;

const WATCH_POLL_MS: u64 = 500;

pub async fn run_target(client: &DaemonClient, action: TargetCommands) -> Result<()> {
    match action {
        TargetCommands::Add {
            name,
            host,
            user,
            port,
            password,
            key,
        } => target_add(client, name, host, user, port, password, key).await,
        TargetCommands::List => target_list(client).await,
        TargetCommands::Remove { id } => {
            client.remove_target(id).await?;
            println!("{} target {}", "Removed".green(), id);
            Ok(())
        }
    }
}

async fn target_add(
    client: &DaemonClient,
    name: String,
    host: String,
    user: String,
    port: u16,
    password: Option<String>,
    key: Option<PathBuf>,
) -> Result<()> {
    let credential = match (password, key) {
        (Some(p), None) => Credential::Password(p),
        (None, Some(k)) => Credential::KeyFile(k),
        _ => return Err(anyhow!("provide exactly one of --password or --key")),
    };
    let target = client
        .register_target(&RegisterTargetRequest {
            name,
            host,
            port: Some(port),
            username: user,
            credential,
        })
        .await?;
    println!(
        "{} {} ({}@{})",
        "Registered".green(),
        target.name.bold(),
        target.username,
        target.addr()
    );
    println!("  id: {}", target.id);
    Ok(())
}

async fn target_list(client: &DaemonClient) -> Result<()> {
    let targets = client.list_targets().await?;
    if targets.is_empty() {
        println!("No targets registered.");
        return Ok(());
    }
    println!(
        "{:<38} {:<20} {:<28} {}",
        "ID".bold(),
        "NAME".bold(),
        "ADDRESS".bold(),
        "AUTH".bold()
    );
    for t in targets {
        let auth = match t.credential {
            Credential::Password(_) => "password",
            Credential::KeyFile(_) => "key",
        };
        println!(
            "{:<38} {:<20} {:<28} {}",
            t.id.to_string(),
            t.name,
            format!("{}@{}", t.username, t.addr()),
            auth
        );
    }
    Ok(())
}

pub async fn run_audit(client: &DaemonClient, action: AuditCommands) -> Result<()> {
    match action {
        AuditCommands::Start {
            target_id,
            model,
            watch,
        } => {
            let audit_id = client.start_audit(target_id, model).await?;
            println!("{} audit {}", "Started".green(), audit_id);
            if watch {
                watch_audit(client, audit_id).await?;
            }
            Ok(())
        }
        AuditCommands::Status { audit_id } => audit_status(client, audit_id).await,
        AuditCommands::List => audit_list(client).await,
        AuditCommands::Cancel { audit_id } => {
            let resp = client.cancel_audit(audit_id).await?;
            if resp.cancelled {
                println!("{} cancellation of {}", "Requested".yellow(), resp.audit_id);
            } else {
                println!("Audit {} already finished; nothing to cancel.", resp.audit_id);
            }
            Ok(())
        }
        AuditCommands::Watch { audit_id } => watch_audit(client, audit_id).await,
    }
}

async fn audit_status(client: &DaemonClient, audit_id: Uuid) -> Result<()> {
    let status = client.audit_status(audit_id).await?;
    println!("Audit {}", status.id.to_string().bold());
    println!("  phase:    {}", phase_colored(&status.status.to_string()));
    println!("  progress: {}%", status.progress);
    println!("  step:     {}", status.current_step);
    println!(
        "  started:  {}",
        status.start_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  findings: {}", status.findings_count);
    if let Some(scores) = status.scores {
        println!(
            "  scores:   overall {} | security {} | performance {} | compliance {}",
            score_colored(scores.overall),
            scores.security,
            scores.performance,
            scores.compliance
        );
    }
    Ok(())
}

async fn audit_list(client: &DaemonClient) -> Result<()> {
    let resp = client.list_audits().await?;
    if resp.audits.is_empty() {
        println!("No audits yet.");
        return Ok(());
    }
    println!(
        "{:<38} {:<12} {:>8}  {:<20} {}",
        "ID".bold(),
        "PHASE".bold(),
        "PROG".bold(),
        "STARTED".bold(),
        "FINDINGS".bold()
    );
    for a in resp.audits {
        println!(
            "{:<38} {:<12} {:>7}%  {:<20} {}",
            a.id.to_string(),
            a.status.to_string(),
            a.progress,
            a.start_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            a.findings_count
        );
    }
    Ok(())
}

/// Poll the status endpoint until the audit reaches a terminal phase,
/// rendering a progress bar along the way.
async fn watch_audit(client: &DaemonClient, audit_id: Uuid) -> Result<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(120));

    loop {
        let status = client.audit_status(audit_id).await?;
        bar.set_position(status.progress as u64);
        bar.set_message(format!("{}: {}", status.status, status.current_step));
        if status.status.is_terminal() {
            bar.finish_and_clear();
            println!(
                "Audit {} {}",
                audit_id,
                phase_colored(&status.status.to_string())
            );
            if let Some(scores) = status.scores {
                println!(
                    "  overall {} | security {} | performance {} | compliance {}",
                    score_colored(scores.overall),
                    scores.security,
                    scores.performance,
                    scores.compliance
                );
            }
            if status.findings_count > 0 {
                println!("  {} finding(s) recorded", status.findings_count);
            }
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(WATCH_POLL_MS)).await;
    }
}

pub async fn run_models(client: &DaemonClient) -> Result<()> {
    let models = client.list_models().await?;
    if models.is_empty() {
        println!("No models available.");
        return Ok(());
    }
    for m in models {
        println!("{}", m);
    }
    Ok(())
}

pub async fn run_health(client: &DaemonClient) -> Result<()> {
    let health = client.health().await?;
    let status = if health.status == "healthy" {
        health.status.green().to_string()
    } else {
        health.status.red().to_string()
    };
    println!("Status:         {}", status);
    println!("Version:        {}", health.version);
    println!("Uptime:         {}s", health.uptime_seconds);
    println!("Open sessions:  {}", health.open_sessions);
    println!("Running audits: {}", health.running_audits);
    Ok(())
}

fn phase_colored(phase: &str) -> String {
    match phase {
        "completed" => phase.green().to_string(),
        "failed" => phase.red().to_string(),
        "cancelled" => phase.yellow().to_string(),
        other => other.cyan().to_string(),
    }
}

fn score_colored(score: u8) -> String {
    if score >= 80 {
        score.green().to_string()
    } else if score >= 50 {
        score.yellow().to_string()
    } else {
        score.red().to_string()
    }
}

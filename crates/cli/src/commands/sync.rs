//! Sync trigger commands.
//!
//! # Usage
//!
//! ```bash
//! # Cron entry point: trigger whatever is due
//! psync run
//!
//! # Force a trigger
//! psync trigger full
//! ```
//!
//! # Environment Variables
//!
//! - `PARTNER_SYNC_URL` - Sync resource to poll and trigger
//! - `PARTNER_TRIGGER_TIMEOUT_SECS` - Trigger acknowledgement timeout

use partner_sync::{GraphQLClient, SyncConfig, SyncReport, SyncScheduler, TriggerOutcome};
use partner_sync_core::SyncKind;

use crate::CliError;

fn scheduler(config: &SyncConfig) -> Result<SyncScheduler, CliError> {
    let client = GraphQLClient::from_config(config)?;
    Ok(SyncScheduler::new(client, config))
}

/// Poll the status and trigger a full or partial sync if one is due.
#[allow(clippy::print_stdout)]
pub async fn run(config: &SyncConfig) -> Result<(), CliError> {
    let report = scheduler(config)?.run_once().await?;
    println!("{}", summarize(&report));
    Ok(())
}

/// Trigger a sync of `kind` regardless of status.
#[allow(clippy::print_stdout)]
pub async fn trigger(config: &SyncConfig, kind: SyncKind) -> Result<(), CliError> {
    let outcome = scheduler(config)?.trigger(kind).await?;
    match &outcome {
        TriggerOutcome::Triggered { envelope, .. } => {
            if let Some(error) = envelope.error() {
                tracing::warn!(%error, "Backend reported errors");
            }
            println!("{kind} sync triggered");
        }
        TriggerOutcome::AlreadyInFlight(_) => println!("{kind} sync already in flight"),
    }
    Ok(())
}

/// One-line human summary of a scheduler run.
fn summarize(report: &SyncReport) -> String {
    match (&report.outcome, report.remote_errors()) {
        (None, _) => format!("{}: nothing triggered", report.decision),
        (Some(TriggerOutcome::AlreadyInFlight(kind)), _) => {
            format!("{}: {kind} sync already in flight", report.decision)
        }
        (Some(TriggerOutcome::Triggered { kind, .. }), None) => {
            format!("{}: {kind} sync triggered", report.decision)
        }
        (Some(TriggerOutcome::Triggered { kind, .. }), Some(error)) => {
            format!("{}: {kind} sync triggered with errors: {error}", report.decision)
        }
    }
}

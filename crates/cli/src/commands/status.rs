//! Sync status inspection.
//!
//! # Usage
//!
//! ```bash
//! psync status
//! ```

use partner_sync::scheduler::{needs_full_sync, needs_partial_sync, overdue, syncs_attempted};
use partner_sync::{GraphQLClient, SyncConfig, SyncScheduler};
use partner_sync_core::SyncKind;

use crate::CliError;

/// Poll the sync status and print it as JSON, followed by what the
/// scheduler would decide.
#[allow(clippy::print_stdout)]
pub async fn show(config: &SyncConfig) -> Result<(), CliError> {
    let client = GraphQLClient::from_config(config)?;
    let scheduler = SyncScheduler::new(client, config);

    let status = scheduler.fetch_status().await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    for kind in SyncKind::ALL {
        tracing::info!(
            %kind,
            attempted = syncs_attempted(Some(&status), Some(kind)),
            overdue = overdue(Some(&status), Some(kind)),
            "Sync kind status"
        );
    }
    tracing::info!(
        full = needs_full_sync(Some(&status)),
        partial = needs_partial_sync(Some(&status)),
        "Sync needed"
    );

    Ok(())
}

//! Partner Sync CLI - Inventory sync trigger for cron jobs and operators.
//!
//! # Usage
//!
//! ```bash
//! # Show the backend's current sync status
//! psync status
//!
//! # Poll the status and trigger whatever sync is due (cron entry point)
//! psync run
//!
//! # Force a sync trigger
//! psync trigger full
//!
//! # Run an ad-hoc GraphQL query
//! psync query '{ warehouses { id } }' --variables '{"first": 10}'
//! ```
//!
//! # Commands
//!
//! - `status` - Print the remote sync status as JSON
//! - `run` - Evaluate the status and trigger a full or partial sync if due
//! - `trigger` - Trigger a sync of the given kind unconditionally
//! - `query` - Execute a GraphQL query and print the response

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use partner_sync::{ConfigError, SyncConfig, SyncError};
use partner_sync_core::SyncKind;
use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "psync")]
#[command(author, version, about = "Partner inventory sync tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current sync status
    Status,
    /// Trigger a full or partial sync if one is due
    Run,
    /// Trigger a sync unconditionally
    Trigger {
        /// Sync kind (`full` or `partial`)
        kind: SyncKind,
    },
    /// Execute a GraphQL query
    Query {
        /// GraphQL document
        query: String,

        /// Query variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// HTTP method (`POST` sends a JSON body, `GET` URL parameters)
        #[arg(short, long, default_value = "POST")]
        method: String,
    },
}

/// Errors that abort a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A partner API call failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// `--variables` was not a JSON object.
    #[error("Invalid variables: {0}")]
    InvalidVariables(String),

    /// Output could not be rendered.
    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Map tracing levels to Sentry: warnings and errors become events, the
/// rest breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "partner_sync=info,psync=info".into());

    // JSON lines when running under a log collector, text on a terminal
    let json = std::env::var_os("PSYNC_LOG_JSON").is_some();
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    // Sentry first so the tracing layer has a client to report to
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);
    init_tracing();

    let result = match config {
        Ok(config) => run(cli, &config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &SyncConfig) -> Result<(), CliError> {
    match cli.command {
        Commands::Status => commands::status::show(config).await?,
        Commands::Run => commands::sync::run(config).await?,
        Commands::Trigger { kind } => commands::sync::trigger(config, kind).await?,
        Commands::Query {
            query,
            variables,
            method,
        } => commands::query::execute(config, &query, variables.as_deref(), &method).await?,
    }
    Ok(())
}

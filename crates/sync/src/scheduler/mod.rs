//! Inventory sync scheduling.
//!
//! Invoked by an external trigger (cron job, page load, operator) that may
//! call it redundantly or concurrently. Decisions are pure reads of the
//! status; the trigger side effect is guarded so at most one trigger per
//! sync kind is in flight per scheduler.
//!
//! Triggers are fire-and-forget: a successful trigger only means the
//! backend acknowledged the request. Completion shows up on a later status
//! poll.

pub mod decision;

use std::sync::Arc;
use std::time::Duration;

use partner_sync_core::{SyncKind, SyncStatus};
use reqwest::Method;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::instrument;

pub use decision::{SyncDecision, decide, needs_full_sync, needs_partial_sync, overdue, syncs_attempted};

use crate::config::{Endpoint, SyncConfig};
use crate::error::SyncError;
use crate::graphql::{GraphQLClient, NormalizedError, ResponseEnvelope};

/// Result of asking the backend to start a sync.
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// The backend acknowledged the trigger.
    Triggered {
        /// Kind of sync requested.
        kind: SyncKind,
        /// Acknowledgement response (may still carry application errors).
        envelope: ResponseEnvelope,
    },
    /// Another trigger for this kind is still in flight; nothing was sent.
    AlreadyInFlight(SyncKind),
}

/// What one scheduler invocation decided and did.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// The decision taken from the status.
    pub decision: SyncDecision,
    /// The trigger outcome, if the decision called for one.
    pub outcome: Option<TriggerOutcome>,
}

impl SyncReport {
    /// Application-level errors reported by the trigger acknowledgement.
    #[must_use]
    pub fn remote_errors(&self) -> Option<NormalizedError> {
        match &self.outcome {
            Some(TriggerOutcome::Triggered { envelope, .. }) => envelope.error(),
            _ => None,
        }
    }

    /// Whether a trigger request was actually sent.
    #[must_use]
    pub const fn triggered(&self) -> bool {
        matches!(self.outcome, Some(TriggerOutcome::Triggered { .. }))
    }
}

/// One in-flight slot per sync kind.
#[derive(Default)]
struct InFlight {
    full: Arc<Mutex<()>>,
    partial: Arc<Mutex<()>>,
}

impl InFlight {
    fn slot(&self, kind: SyncKind) -> Arc<Mutex<()>> {
        match kind {
            SyncKind::Full => Arc::clone(&self.full),
            SyncKind::Partial => Arc::clone(&self.partial),
        }
    }
}

/// Decides whether a sync is due and triggers it.
///
/// Cheap to clone; clones share the in-flight guards.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<SyncSchedulerInner>,
}

struct SyncSchedulerInner {
    client: GraphQLClient,
    endpoint: Endpoint,
    trigger_timeout: Duration,
    in_flight: InFlight,
}

impl SyncScheduler {
    /// Create a scheduler that reaches the configured sync resource through
    /// `client`.
    #[must_use]
    pub fn new(client: GraphQLClient, config: &SyncConfig) -> Self {
        Self {
            inner: Arc::new(SyncSchedulerInner {
                client,
                endpoint: config.sync.clone(),
                trigger_timeout: config.trigger_timeout,
                in_flight: InFlight::default(),
            }),
        }
    }

    /// Poll the backend for the current sync status.
    ///
    /// An empty body, `null` or `{}` is a backend that has never synced.
    /// A status wrapped in `{ "data": ... }` is unwrapped.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Authentication`/`SyncError::Transport` if the
    /// poll fails, and `SyncError::InvalidStatus` if the body reports an
    /// error or cannot be read as a status.
    #[instrument(skip(self))]
    pub async fn fetch_status(&self) -> Result<SyncStatus, SyncError> {
        let envelope = self
            .inner
            .client
            .request(Method::GET, &self.inner.endpoint, None)
            .await?;

        if let Some(error) = envelope.error() {
            return Err(SyncError::InvalidStatus(error.to_string()));
        }

        parse_status(envelope.body())
    }

    /// Ask the backend to start a sync of `kind`.
    ///
    /// Returns [`TriggerOutcome::AlreadyInFlight`] without sending anything
    /// if another trigger for the same kind has not finished. The guard is
    /// released when the request completes, fails, times out or is
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Timeout` if the backend does not acknowledge
    /// within the trigger timeout, or the client's error if the request
    /// fails.
    #[instrument(skip(self), fields(kind = %kind))]
    pub async fn trigger(&self, kind: SyncKind) -> Result<TriggerOutcome, SyncError> {
        let Ok(_guard) = self.inner.in_flight.slot(kind).try_lock_owned() else {
            tracing::info!("Sync trigger already in flight, skipping");
            return Ok(TriggerOutcome::AlreadyInFlight(kind));
        };

        let body = trigger_body(kind);
        let after = self.inner.trigger_timeout;
        let envelope = tokio::time::timeout(
            after,
            self.inner
                .client
                .request(Method::POST, &self.inner.endpoint, Some(body)),
        )
        .await
        .map_err(|_| {
            tracing::warn!(timeout_secs = after.as_secs(), "Sync trigger timed out");
            SyncError::Timeout { kind, after }
        })??;

        if let Some(error) = envelope.error() {
            tracing::warn!(%error, "Sync trigger acknowledged with errors");
        } else {
            tracing::info!("Sync triggered");
        }

        Ok(TriggerOutcome::Triggered { kind, envelope })
    }

    /// Trigger a full sync if [`needs_full_sync`] says so.
    ///
    /// An absent status is a new install and is evaluated as
    /// [`SyncStatus::never_synced`].
    ///
    /// # Errors
    ///
    /// Returns the trigger's error; see [`SyncScheduler::trigger`].
    pub async fn perform_full_sync_if_needed(
        &self,
        status: Option<&SyncStatus>,
    ) -> Result<SyncReport, SyncError> {
        let status = status.cloned().unwrap_or_else(SyncStatus::never_synced);
        if !needs_full_sync(Some(&status)) {
            return Ok(SyncReport {
                decision: SyncDecision::UpToDate,
                outcome: None,
            });
        }

        let outcome = self.trigger(SyncKind::Full).await?;
        Ok(SyncReport {
            decision: SyncDecision::Full,
            outcome: Some(outcome),
        })
    }

    /// Decide between full, partial or nothing, and trigger accordingly.
    ///
    /// An absent status is a new install and is evaluated as
    /// [`SyncStatus::never_synced`].
    ///
    /// # Errors
    ///
    /// Returns the trigger's error; see [`SyncScheduler::trigger`].
    #[instrument(skip(self, status), fields(state = ?status.map(|s| s.status)))]
    pub async fn evaluate_and_trigger(
        &self,
        status: Option<&SyncStatus>,
    ) -> Result<SyncReport, SyncError> {
        let status = status.cloned().unwrap_or_else(SyncStatus::never_synced);
        let decision = decide(Some(&status));
        tracing::debug!(%decision, "Evaluated sync status");

        let outcome = match decision.kind() {
            Some(kind) => Some(self.trigger(kind).await?),
            None => None,
        };

        Ok(SyncReport { decision, outcome })
    }

    /// Poll the status, then evaluate and trigger.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let status = self.fetch_status().await?;
        self.evaluate_and_trigger(Some(&status)).await
    }
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("endpoint", &self.inner.endpoint.url.as_str())
            .field("trigger_timeout", &self.inner.trigger_timeout)
            .finish_non_exhaustive()
    }
}

/// Trigger payload: `{ "data": { "<kind>": true } }`.
fn trigger_body(kind: SyncKind) -> Value {
    let mut data = serde_json::Map::new();
    data.insert(kind.as_str().to_owned(), Value::Bool(true));
    serde_json::json!({ "data": data })
}

/// Interpret a sync status body.
fn parse_status(body: &str) -> Result<SyncStatus, SyncError> {
    if body.trim().is_empty() {
        return Ok(SyncStatus::never_synced());
    }

    let value: Value =
        serde_json::from_str(body).map_err(|e| SyncError::InvalidStatus(e.to_string()))?;

    let value = match value {
        Value::Null => return Ok(SyncStatus::never_synced()),
        Value::Object(mut map) if !map.contains_key("status") && !map.contains_key("details") => {
            match map.remove("data") {
                Some(Value::Null) | None => return Ok(SyncStatus::never_synced()),
                Some(inner) => inner,
            }
        }
        other => other,
    };

    serde_json::from_value(value).map_err(|e| SyncError::InvalidStatus(e.to_string()))
}

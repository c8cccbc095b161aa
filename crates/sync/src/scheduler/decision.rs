//! Pure sync decision rules over a remote-reported [`SyncStatus`].
//!
//! Absence is handled asymmetrically: no status means "overdue" but also
//! "never attempted". Either way, no evidence of a prior sync counts as
//! evidence that one is needed.
//!
//! The backend's `overdue` flag is authoritative and is never recomputed
//! from timestamps here.

use partner_sync_core::{SyncKind, SyncState, SyncStatus};

/// What the scheduler should trigger now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncDecision {
    /// Trigger a full sync.
    Full,
    /// Trigger a partial sync.
    Partial,
    /// Nothing to do this cycle.
    UpToDate,
}

impl SyncDecision {
    /// The sync kind to trigger, if any.
    #[must_use]
    pub const fn kind(self) -> Option<SyncKind> {
        match self {
            Self::Full => Some(SyncKind::Full),
            Self::Partial => Some(SyncKind::Partial),
            Self::UpToDate => None,
        }
    }
}

impl std::fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full sync needed"),
            Self::Partial => write!(f, "partial sync needed"),
            Self::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Whether a sync has been attempted.
///
/// With `kind`, checks that kind's record for a non-empty start timestamp.
/// Without, checks whether any record has one. Absent status or details
/// means `false`.
#[must_use]
pub fn syncs_attempted(status: Option<&SyncStatus>, kind: Option<SyncKind>) -> bool {
    let Some(details) = status.and_then(|s| s.details.as_ref()) else {
        return false;
    };

    match kind {
        Some(kind) => details
            .get(kind.as_str())
            .is_some_and(|record| record.has_attempted_start()),
        None => details.values().any(|record| record.has_attempted_start()),
    }
}

/// Whether the backend flags a sync as overdue.
///
/// With `kind`, returns that kind's flag (`false` if the record is absent).
/// Without, returns whether any record is flagged. Absent status or
/// details means `true`.
#[must_use]
pub fn overdue(status: Option<&SyncStatus>, kind: Option<SyncKind>) -> bool {
    let Some(details) = status.and_then(|s| s.details.as_ref()) else {
        return true;
    };

    match kind {
        Some(kind) => details
            .get(kind.as_str())
            .is_some_and(|record| record.overdue),
        None => details.values().any(|record| record.overdue),
    }
}

/// Whether a full sync must be triggered.
///
/// Never while the declared state is already `full`. Otherwise when a full
/// sync was never attempted, or the backend flags it overdue regardless of
/// attempt history. An absent status never needs one.
#[must_use]
pub fn needs_full_sync(status: Option<&SyncStatus>) -> bool {
    let Some(current) = status else {
        return false;
    };

    current.status != SyncState::Full
        && (!syncs_attempted(status, Some(SyncKind::Full))
            || overdue(status, Some(SyncKind::Full)))
}

/// Whether a partial sync must be triggered.
///
/// Only when no full sync is needed and the backend flags the partial
/// sync as overdue.
#[must_use]
pub fn needs_partial_sync(status: Option<&SyncStatus>) -> bool {
    status.is_some() && !needs_full_sync(status) && overdue(status, Some(SyncKind::Partial))
}

/// Decide what to trigger now. Full takes precedence over partial.
#[must_use]
pub fn decide(status: Option<&SyncStatus>) -> SyncDecision {
    if needs_full_sync(status) {
        SyncDecision::Full
    } else if needs_partial_sync(status) {
        SyncDecision::Partial
    } else {
        SyncDecision::UpToDate
    }
}

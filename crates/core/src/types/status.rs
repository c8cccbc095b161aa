//! Remote-reported inventory sync status.
//!
//! The partner backend owns the sync state; these types only mirror what it
//! reports. In particular the `overdue` flag is computed remotely and is
//! authoritative.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Kind of inventory sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    /// Complete re-synchronization of every inventory record.
    Full,
    /// Incremental synchronization of changed records.
    Partial,
}

impl SyncKind {
    /// All sync kinds, full first.
    pub const ALL: [Self; 2] = [Self::Full, Self::Partial];

    /// Wire name used as a key in status details and trigger payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
        }
    }
}

impl std::fmt::Display for SyncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "partial" => Ok(Self::Partial),
            _ => Err(format!("invalid sync kind: {s}")),
        }
    }
}

/// Declared current sync state of the merchant's inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// No sync has completed.
    #[default]
    None,
    /// Only partial syncs have completed.
    Partial,
    /// A full sync has completed.
    Full,
    /// A state this client does not know about.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Partial => write!(f, "partial"),
            Self::Full => write!(f, "full"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Remote-reported state of one sync kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAttemptRecord {
    /// When the most recent attempt started. Kept verbatim: an empty string
    /// is reported by the backend and counts as "never attempted".
    #[serde(default)]
    pub attempted_start: Option<String>,
    /// Backend-computed flag: this kind has exceeded its expected cadence.
    #[serde(default, deserialize_with = "null_as_default")]
    pub overdue: bool,
    /// When the most recent attempt completed.
    #[serde(default)]
    pub last_completion: Option<String>,
    /// Whether the most recent attempt succeeded.
    #[serde(default)]
    pub last_attempt_succeeded: Option<bool>,
}

impl SyncAttemptRecord {
    /// Whether a start timestamp is recorded (present and non-empty).
    #[must_use]
    pub fn has_attempted_start(&self) -> bool {
        self.attempted_start
            .as_deref()
            .is_some_and(|start| !start.trim().is_empty())
    }
}

/// Sync status reported by the partner backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Declared current state.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: SyncState,
    /// Per-kind attempt records, keyed by wire name (`"full"`, `"partial"`).
    ///
    /// Unknown kinds are preserved so a newer backend round-trips cleanly.
    #[serde(default)]
    pub details: Option<BTreeMap<String, SyncAttemptRecord>>,
}

impl SyncStatus {
    /// Status of an install that has never synced.
    #[must_use]
    pub const fn never_synced() -> Self {
        Self {
            status: SyncState::None,
            details: None,
        }
    }

    /// Look up the attempt record for a sync kind.
    #[must_use]
    pub fn detail(&self, kind: SyncKind) -> Option<&SyncAttemptRecord> {
        self.details.as_ref()?.get(kind.as_str())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//! Unified error handling for the partner integration.

use std::time::Duration;

use partner_sync_core::SyncKind;
use thiserror::Error;

use crate::auth::AuthenticationError;
use crate::graphql::TransportError;

/// Error returned by every fallible sync operation.
///
/// Application-level errors reported inside a response body are not
/// represented here; they travel as data on the response envelope.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No usable credential could be obtained.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The request failed on the wire.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A sync trigger did not complete in time. The in-flight guard has
    /// been released.
    #[error("{kind} sync trigger timed out after {}s", .after.as_secs())]
    Timeout {
        /// Kind of sync that was being triggered.
        kind: SyncKind,
        /// Configured trigger timeout.
        after: Duration,
    },

    /// The backend returned a sync status this client cannot interpret.
    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),
}

impl SyncError {
    /// Whether the failure came from authentication rather than the remote call.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::Timeout {
            kind: SyncKind::Full,
            after: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "full sync trigger timed out after 30s");

        let err = SyncError::InvalidStatus("expected object".to_string());
        assert_eq!(err.to_string(), "Invalid sync status: expected object");
    }

    #[test]
    fn test_authentication_error_conversion() {
        let err: SyncError = AuthenticationError::MalformedResponse("no token".to_string()).into();
        assert!(err.is_authentication());
        assert_eq!(
            err.to_string(),
            "Authentication failed: Malformed token response: no token"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: SyncError = TransportError::Timeout("30s elapsed".to_string()).into();
        assert!(!err.is_authentication());
        assert_eq!(
            err.to_string(),
            "Transport error: Request timed out: 30s elapsed"
        );
    }
}

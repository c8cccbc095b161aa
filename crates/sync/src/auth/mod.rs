//! Partner API authentication.
//!
//! Keeps one valid access token per audience and renders the bearer header
//! for outbound requests.
//!
//! # Architecture
//!
//! - [`TokenStore`] caches credentials in memory, keyed by audience
//! - [`IdentityProvider`] issues new tokens (OAuth client credentials by default)
//! - [`AuthenticationManager`] ties them together: `refresh` then
//!   `generate_oauth_header`, always as a pair
//!
//! There is no retry at this layer. A failed identity call aborts the
//! request that needed the token.

pub mod identity;
pub mod store;

use std::sync::Arc;

use chrono::Utc;
use partner_sync_core::{Audience, Credential};
use secrecy::SecretString;
use thiserror::Error;
use tracing::instrument;

pub use identity::{IdentityProvider, IssuedToken, OAuthClientCredentials};
pub use store::TokenStore;

/// Errors that can occur while obtaining or using credentials.
#[derive(Debug, Clone, Error)]
pub enum AuthenticationError {
    /// The identity provider could not be reached.
    #[error("Identity provider request failed: {0}")]
    Http(String),

    /// The identity provider refused to issue a token.
    #[error("Identity provider rejected the request (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Provider error description.
        message: String,
    },

    /// The identity provider returned an unusable payload.
    #[error("Malformed token response: {0}")]
    MalformedResponse(String),

    /// No valid credential is cached for the audience.
    #[error("No valid credential for audience {0} - refresh required")]
    NoCredential(Audience),
}

/// Ensures a fresh credential exists per audience.
///
/// Cheap to clone; clones share the token store and provider.
#[derive(Clone)]
pub struct AuthenticationManager {
    store: TokenStore,
    provider: Arc<dyn IdentityProvider>,
}

impl AuthenticationManager {
    /// Create a manager over `store`, issuing tokens through `provider`.
    #[must_use]
    pub fn new(store: TokenStore, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { store, provider }
    }

    /// The underlying token store.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Ensure a non-expired credential exists for `audience`.
    ///
    /// Returns the cached credential when it is still valid. Otherwise asks
    /// the identity provider for a new one and stores it. Concurrent
    /// refreshes for the same audience share a single provider call.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError` if the identity call fails or returns a
    /// token that would already be inside the refresh window.
    #[instrument(skip(self), fields(audience = %audience))]
    pub async fn refresh(&self, audience: &Audience) -> Result<Credential, AuthenticationError> {
        let skew = self.store.skew();
        let provider = Arc::clone(&self.provider);

        let credential = self
            .store
            .get_or_refresh(audience, async move {
                let issued = provider.issue_token(audience).await.inspect_err(|e| {
                    tracing::warn!(error = %e, "Token refresh failed");
                })?;

                let expires_at = chrono::Duration::from_std(issued.expires_in)
                    .ok()
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AuthenticationError::MalformedResponse("expires_in out of range".to_string())
                    })?;

                tracing::info!(%expires_at, "Obtained new access token");
                Ok(Credential::new(audience.clone(), issued.access_token, expires_at))
            })
            .await
            .map_err(Arc::unwrap_or_clone)?;

        if credential.is_expired_at(Utc::now(), skew) {
            // Token lifetime shorter than the skew; caching it would loop.
            self.store.invalidate(audience).await;
            return Err(AuthenticationError::MalformedResponse(format!(
                "token for {audience} expires within the refresh window"
            )));
        }

        Ok(credential)
    }

    /// Render the `Authorization` header value for `audience`.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError::NoCredential` unless [`refresh`] was
    /// called first and its credential is still valid.
    ///
    /// [`refresh`]: AuthenticationManager::refresh
    pub async fn generate_oauth_header(
        &self,
        audience: &Audience,
    ) -> Result<SecretString, AuthenticationError> {
        self.store
            .get(audience)
            .await
            .map(|credential| credential.bearer_header())
            .ok_or_else(|| AuthenticationError::NoCredential(audience.clone()))
    }
}

impl std::fmt::Debug for AuthenticationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationManager")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

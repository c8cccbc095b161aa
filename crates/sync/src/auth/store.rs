//! In-memory credential cache, one credential per audience.
//!
//! Backed by `moka` with a per-entry expiry derived from each credential's
//! own `expires_at`, so stale tokens fall out of the cache on their own.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use moka::Expiry;
use moka::future::Cache;
use partner_sync_core::{Audience, Credential};

use super::AuthenticationError;

/// Upper bound on cached audiences. A deployment talks to a handful.
const MAX_AUDIENCES: u64 = 64;

/// Evicts a credential once it enters the refresh skew window.
struct CredentialExpiry {
    skew: chrono::Duration,
}

impl CredentialExpiry {
    fn time_to_live(&self, credential: &Credential) -> Duration {
        credential
            .remaining_at(Utc::now(), self.skew)
            .unwrap_or(Duration::ZERO)
    }
}

impl Expiry<Audience, Credential> for CredentialExpiry {
    fn expire_after_create(
        &self,
        _audience: &Audience,
        credential: &Credential,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(self.time_to_live(credential))
    }

    fn expire_after_update(
        &self,
        _audience: &Audience,
        credential: &Credential,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(self.time_to_live(credential))
    }
}

/// Credential cache keyed by [`Audience`].
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct TokenStore {
    cache: Cache<Audience, Credential>,
    skew: chrono::Duration,
}

impl TokenStore {
    /// Create an empty store. Credentials expiring within `skew` are
    /// treated as already expired.
    #[must_use]
    pub fn new(skew: Duration) -> Self {
        let skew = chrono::Duration::from_std(skew).unwrap_or(chrono::Duration::MAX);
        let cache = Cache::builder()
            .max_capacity(MAX_AUDIENCES)
            .expire_after(CredentialExpiry { skew })
            .build();

        Self { cache, skew }
    }

    /// The refresh skew applied by this store.
    #[must_use]
    pub const fn skew(&self) -> chrono::Duration {
        self.skew
    }

    /// Get the credential for `audience`, if one is cached and not expired.
    pub async fn get(&self, audience: &Audience) -> Option<Credential> {
        self.cache
            .get(audience)
            .await
            .filter(|credential| !credential.is_expired_at(Utc::now(), self.skew))
    }

    /// Store a credential under its own audience, replacing any previous one.
    pub async fn put(&self, credential: Credential) {
        self.cache
            .insert(credential.audience().clone(), credential)
            .await;
    }

    /// Drop the credential for `audience` (e.g. after the remote API rejected it).
    pub async fn invalidate(&self, audience: &Audience) {
        self.cache.invalidate(audience).await;
    }

    /// Get the cached credential or run `init` to obtain one.
    ///
    /// Concurrent callers for the same audience share a single `init`; the
    /// others wait for its result. Failed initializations are not cached.
    pub(crate) async fn get_or_refresh<F>(
        &self,
        audience: &Audience,
        init: F,
    ) -> Result<Credential, Arc<AuthenticationError>>
    where
        F: Future<Output = Result<Credential, AuthenticationError>>,
    {
        if let Some(credential) = self.get(audience).await {
            return Ok(credential);
        }

        self.cache.try_get_with_by_ref(audience, init).await
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("entries", &self.cache.entry_count())
            .field("skew", &self.skew)
            .finish()
    }
}

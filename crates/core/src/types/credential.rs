//! OAuth credential type.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use super::Audience;

/// An access token scoped to one [`Audience`].
///
/// Credentials are replaced wholesale on refresh and never mutated in place,
/// so every field is private and only readable.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct Credential {
    audience: Audience,
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a new credential.
    #[must_use]
    pub const fn new(audience: Audience, access_token: SecretString, expires_at: DateTime<Utc>) -> Self {
        Self {
            audience,
            access_token,
            expires_at,
        }
    }

    /// The audience this credential was issued for.
    #[must_use]
    pub const fn audience(&self) -> &Audience {
        &self.audience
    }

    /// The access token (HIGH PRIVILEGE - never log).
    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// When the access token expires.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check whether the credential is expired at `now`, treating tokens
    /// that expire within `skew` as already expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        now >= self.expires_at - skew
    }

    /// Check whether the credential is expired right now (no skew).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now(), Duration::zero())
    }

    /// Time left before the credential reaches `expires_at - skew`.
    ///
    /// Returns `None` once that point has passed.
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>, skew: Duration) -> Option<std::time::Duration> {
        (self.expires_at - skew - now).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Render the `Authorization` header value for this credential.
    #[must_use]
    pub fn bearer_header(&self) -> SecretString {
        SecretString::from(format!("Bearer {}", self.access_token.expose_secret()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("audience", &self.audience)
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

//! Credential audience type.

use core::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Errors that can occur when constructing an [`Audience`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AudienceError {
    /// The input string is empty.
    #[error("audience cannot be empty")]
    Empty,
    /// The URL has no tuple origin (e.g. `data:` or `file:` URLs).
    #[error("cannot derive an audience from {0}: URL has no origin")]
    OpaqueOrigin(String),
}

/// The logical target a credential is scoped to.
///
/// One credential is cached per audience. An audience is computed once from
/// an endpoint URL (or taken verbatim from configuration) and then passed
/// alongside that URL, so call sites never reverse-engineer it.
///
/// ## Examples
///
/// ```
/// use partner_sync_core::Audience;
/// use url::Url;
///
/// let url = Url::parse("https://api.partner.example/graphql").unwrap();
/// let audience = Audience::from_url(&url).unwrap();
/// assert_eq!(audience.as_str(), "https://api.partner.example");
///
/// assert!(Audience::parse("").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Audience(String);

impl Audience {
    /// Parse an `Audience` from a configured string.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`AudienceError::Empty`] if the trimmed input is empty.
    pub fn parse(s: &str) -> Result<Self, AudienceError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AudienceError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Derive an audience from an endpoint URL.
    ///
    /// The audience is the URL's origin: scheme, host and any non-default
    /// port, without path, query or trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`AudienceError::OpaqueOrigin`] for URLs without a host.
    pub fn from_url(url: &Url) -> Result<Self, AudienceError> {
        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(AudienceError::OpaqueOrigin(url.to_string()));
        }
        Ok(Self(origin.ascii_serialization()))
    }

    /// Get the audience as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert into the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Audience {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Audience {
    type Err = AudienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

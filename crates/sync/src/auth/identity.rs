//! Identity provider access.
//!
//! Obtains access tokens via the OAuth client-credentials grant, one token
//! per audience.

use std::time::Duration;

use async_trait::async_trait;
use partner_sync_core::Audience;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;
use url::Url;

use super::AuthenticationError;
use crate::config::OAuthConfig;

/// A freshly issued access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Token lifetime from the moment of issuance.
    pub expires_in: Duration,
}

/// Source of access tokens for an audience.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a new access token scoped to `audience`.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationError` if the provider is unreachable, rejects
    /// the request, or returns an unusable payload.
    async fn issue_token(&self, audience: &Audience) -> Result<IssuedToken, AuthenticationError>;
}

/// Response from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error response from the token endpoint (RFC 6749 section 5.2).
#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth client-credentials identity provider.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct OAuthClientCredentials {
    client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
}

impl OAuthClientCredentials {
    /// Create a provider that issues tokens through `client`.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &OAuthConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

impl std::fmt::Debug for OAuthClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientCredentials")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for OAuthClientCredentials {
    #[instrument(skip(self), fields(audience = %audience))]
    async fn issue_token(&self, audience: &Audience) -> Result<IssuedToken, AuthenticationError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
                ("audience", audience.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthenticationError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthenticationError::Http(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        "Unknown error".to_string()
                    } else {
                        body.clone()
                    }
                });

            return Err(AuthenticationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        parse_token_response(&body)
    }
}

/// Validate a successful token endpoint payload.
fn parse_token_response(body: &str) -> Result<IssuedToken, AuthenticationError> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| AuthenticationError::MalformedResponse(e.to_string()))?;

    let access_token = response
        .access_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| AuthenticationError::MalformedResponse("missing access_token".to_string()))?;

    let expires_in = response
        .expires_in
        .and_then(|secs| u64::try_from(secs).ok())
        .filter(|secs| *secs > 0)
        .ok_or_else(|| {
            AuthenticationError::MalformedResponse("missing or non-positive expires_in".to_string())
        })?;

    Ok(IssuedToken {
        access_token: SecretString::from(access_token),
        expires_in: Duration::from_secs(expires_in),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(server: &MockServer) -> OAuthClientCredentials {
        OAuthClientCredentials::new(
            reqwest::Client::new(),
            &OAuthConfig {
                token_url: Url::parse(&format!("{}/oauth/token", server.uri())).unwrap(),
                client_id: "plugin-client".to_string(),
                client_secret: SecretString::from("s3cr3t-Value"),
            },
        )
    }

    fn audience() -> Audience {
        Audience::parse("https://api.partner.test").unwrap()
    }

    #[test]
    fn test_parse_token_response() {
        let token = parse_token_response(r#"{"access_token":"abc","expires_in":3600,"token_type":"Bearer"}"#)
            .unwrap();
        assert_eq!(token.access_token.expose_secret(), "abc");
        assert_eq!(token.expires_in, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_token_response_malformed() {
        for body in [
            "not json",
            r#"{"expires_in":3600}"#,
            r#"{"access_token":"","expires_in":3600}"#,
            r#"{"access_token":"abc"}"#,
            r#"{"access_token":"abc","expires_in":0}"#,
            r#"{"access_token":"abc","expires_in":-5}"#,
        ] {
            assert!(
                matches!(
                    parse_token_response(body),
                    Err(AuthenticationError::MalformedResponse(_))
                ),
                "expected malformed for {body}"
            );
        }
    }

    #[tokio::test]
    async fn test_issue_token_sends_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=plugin-client"))
            .and(body_string_contains("audience=https%3A%2F%2Fapi.partner.test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "tok-1", "expires_in": 7200})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let token = provider(&server).issue_token(&audience()).await.unwrap();
        assert_eq!(token.access_token.expose_secret(), "tok-1");
        assert_eq!(token.expires_in, Duration::from_secs(7200));
    }

    #[tokio::test]
    async fn test_issue_token_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "Client authentication failed"
            })))
            .mount(&server)
            .await;

        let err = provider(&server).issue_token(&audience()).await.unwrap_err();
        match err {
            AuthenticationError::Rejected { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Client authentication failed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_token_unreachable() {
        let provider = OAuthClientCredentials::new(
            reqwest::Client::new(),
            &OAuthConfig {
                token_url: Url::parse("http://127.0.0.1:1/oauth/token").unwrap(),
                client_id: "plugin-client".to_string(),
                client_secret: SecretString::from("s3cr3t-Value"),
            },
        );

        let err = provider.issue_token(&audience()).await.unwrap_err();
        assert!(matches!(err, AuthenticationError::Http(_)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let provider = OAuthClientCredentials::new(
            reqwest::Client::new(),
            &OAuthConfig {
                token_url: Url::parse("https://id.partner.test/oauth/token").unwrap(),
                client_id: "plugin-client".to_string(),
                client_secret: SecretString::from("s3cr3t-Value"),
            },
        );
        let debug_output = format!("{provider:?}");
        assert!(debug_output.contains("plugin-client"));
        assert!(!debug_output.contains("s3cr3t-Value"));
    }
}

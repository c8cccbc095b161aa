//! Integration tests for the partner sync client.
//!
//! Every test runs against a [`wiremock`] server standing in for the
//! identity provider, the GraphQL API and the sync backend at once.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p partner-sync-integration-tests
//! ```

use std::collections::HashMap;

use partner_sync::{GraphQLClient, SyncConfig, SyncScheduler};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the mock OAuth token endpoint.
pub const TOKEN_PATH: &str = "/oauth/token";
/// Path of the mock GraphQL endpoint.
pub const GRAPHQL_PATH: &str = "/graphql";
/// Path of the mock sync resource.
pub const SYNC_PATH: &str = "/v1/inventory/sync";
/// Agent header value sent on every call.
pub const AGENT: &str = "partner-sync/integration";
/// Audience of the sync resource.
pub const SYNC_AUDIENCE: &str = "https://inventory.partner.test";

/// A mock partner backend plus a configuration pointing at it.
pub struct TestContext {
    /// The mock server.
    pub server: MockServer,
    /// Configuration targeting [`TestContext::server`].
    pub config: SyncConfig,
}

impl TestContext {
    /// Start a mock server and build a configuration for it.
    ///
    /// # Panics
    ///
    /// Panics if the generated configuration is rejected.
    pub async fn new() -> Self {
        Self::with_vars(&[]).await
    }

    /// Like [`TestContext::new`], overriding individual variables.
    ///
    /// # Panics
    ///
    /// Panics if the generated configuration is rejected.
    pub async fn with_vars(overrides: &[(&str, &str)]) -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();

        let mut vars: HashMap<String, String> = HashMap::from([
            ("PARTNER_GRAPHQL_URL".into(), format!("{uri}{GRAPHQL_PATH}")),
            ("PARTNER_SYNC_URL".into(), format!("{uri}{SYNC_PATH}")),
            ("PARTNER_SYNC_AUDIENCE".into(), SYNC_AUDIENCE.into()),
            ("PARTNER_OAUTH_TOKEN_URL".into(), format!("{uri}{TOKEN_PATH}")),
            ("PARTNER_OAUTH_CLIENT_ID".into(), "plugin-client".into()),
            (
                "PARTNER_OAUTH_CLIENT_SECRET".into(),
                "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6".into(),
            ),
            ("PARTNER_AGENT".into(), AGENT.into()),
            ("PARTNER_HTTP_TIMEOUT_SECS".into(), "5".into()),
            ("PARTNER_TRIGGER_TIMEOUT_SECS".into(), "5".into()),
        ]);
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = SyncConfig::from_lookup(|key| vars.get(key).cloned())
            .unwrap_or_else(|e| panic!("test configuration rejected: {e}"));

        Self { server, config }
    }

    /// A production client wired to the mock server.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client(&self) -> GraphQLClient {
        GraphQLClient::from_config(&self.config)
            .unwrap_or_else(|e| panic!("client setup failed: {e}"))
    }

    /// A scheduler over [`TestContext::client`].
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn scheduler(&self) -> SyncScheduler {
        SyncScheduler::new(self.client(), &self.config)
    }

    /// Mount a token endpoint issuing `token` for one hour, expecting
    /// exactly `calls` requests.
    pub async fn mount_token(&self, token: &str, calls: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": token,
                "token_type": "Bearer",
                "expires_in": 3600,
            })))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Mount the sync status poll returning `body`.
    pub async fn mount_status(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path(SYNC_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&self.server)
            .await;
    }
}

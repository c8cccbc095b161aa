//! Signed request execution against the partner API.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::{Map, Value};
use tracing::instrument;
use url::Url;

use super::response::ResponseEnvelope;
use super::transport::{ReqwestTransport, Transport, TransportRequest, build_http_client};
use super::{QueryRequest, TransportError};
use crate::auth::{AuthenticationError, AuthenticationManager, OAuthClientCredentials, TokenStore};
use crate::config::{AgentHeader, Endpoint, SyncConfig};
use crate::error::SyncError;

/// Partner GraphQL API client.
///
/// Every call refreshes the target audience's token if needed, signs the
/// request and dispatches it through the injected transport.
///
/// Cheap to clone; clones share the token store and transport.
#[derive(Clone)]
pub struct GraphQLClient {
    inner: Arc<GraphQLClientInner>,
}

struct GraphQLClientInner {
    auth: AuthenticationManager,
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    agent: AgentHeader,
}

impl GraphQLClient {
    /// Create a client with injected authentication and transport.
    #[must_use]
    pub fn new(
        config: &SyncConfig,
        auth: AuthenticationManager,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            inner: Arc::new(GraphQLClientInner {
                auth,
                transport,
                endpoint: config.graphql.clone(),
                agent: config.agent.clone(),
            }),
        }
    }

    /// Create a production client: `reqwest` transport and OAuth
    /// client-credentials, sharing one HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Transport` if the HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let http = build_http_client(config.http_timeout)?;
        let provider = OAuthClientCredentials::new(http.clone(), &config.oauth);
        let auth = AuthenticationManager::new(
            TokenStore::new(config.token_skew),
            Arc::new(provider),
        );
        let transport = ReqwestTransport::with_client(http);

        Ok(Self::new(config, auth, Arc::new(transport)))
    }

    /// The GraphQL endpoint this client targets.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// The authentication manager (shared token store).
    #[must_use]
    pub fn auth(&self) -> &AuthenticationManager {
        &self.inner.auth
    }

    /// Execute a GraphQL query against the configured endpoint.
    ///
    /// `POST` (and any method other than `GET`) sends
    /// `{ "query": ..., "variables": ... }` as the JSON body; `GET` sends
    /// them as URL parameters.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Authentication` if no token could be obtained and
    /// `SyncError::Transport` if the call failed on the wire. Errors
    /// reported in the response body are returned inside the envelope.
    pub async fn query(
        &self,
        query: &str,
        method: Method,
        variables: Map<String, Value>,
    ) -> Result<ResponseEnvelope, SyncError> {
        self.execute(&QueryRequest {
            query: query.to_owned(),
            method,
            variables,
        })
        .await
    }

    /// Execute a prepared [`QueryRequest`].
    ///
    /// # Errors
    ///
    /// Same as [`GraphQLClient::query`].
    pub async fn execute(&self, request: &QueryRequest) -> Result<ResponseEnvelope, SyncError> {
        let endpoint = &self.inner.endpoint;
        let variables = Value::Object(request.variables.clone()).to_string();

        if request.method == Method::GET {
            let mut url = endpoint.url.clone();
            url.query_pairs_mut()
                .append_pair("query", &request.query)
                .append_pair("variables", &variables);
            tracing::debug!(
                url = %url,
                query = %request.query,
                variables = %variables,
                "Dispatching GraphQL query"
            );
            self.dispatch(Method::GET, url, endpoint, None).await
        } else {
            let body = request.body();
            tracing::debug!(
                url = %endpoint.url,
                query = %request.query,
                variables = %variables,
                "Dispatching GraphQL query"
            );
            self.dispatch(request.method.clone(), endpoint.url.clone(), endpoint, Some(body))
                .await
        }
    }

    /// Send a signed request to any partner endpoint (e.g. the sync resource).
    ///
    /// # Errors
    ///
    /// Same as [`GraphQLClient::query`].
    pub async fn request(
        &self,
        method: Method,
        endpoint: &Endpoint,
        body: Option<Value>,
    ) -> Result<ResponseEnvelope, SyncError> {
        let rendered = body.as_ref().map_or_else(String::new, ToString::to_string);
        tracing::debug!(
            url = %endpoint.url,
            %method,
            body = %rendered,
            "Dispatching partner API request"
        );
        self.dispatch(method, endpoint.url.clone(), endpoint, body)
            .await
    }

    #[instrument(skip(self, endpoint, body), fields(audience = %endpoint.audience))]
    async fn dispatch(
        &self,
        method: Method,
        url: Url,
        endpoint: &Endpoint,
        body: Option<Value>,
    ) -> Result<ResponseEnvelope, SyncError> {
        let auth = &self.inner.auth;
        let credential = auth.refresh(&endpoint.audience).await?;
        // From the refreshed credential; the store may be invalidated concurrently.
        let authorization = credential.bearer_header();

        let mut headers = HeaderMap::new();
        let mut authorization = HeaderValue::from_str(authorization.expose_secret()).map_err(|_| {
            AuthenticationError::MalformedResponse(
                "access token is not a valid header value".to_string(),
            )
        })?;
        authorization.set_sensitive(true);
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(self.inner.agent.name.clone(), self.inner.agent.value.clone());

        let envelope = self
            .inner
            .transport
            .send(TransportRequest {
                method,
                url,
                headers,
                body,
            })
            .await?;

        if envelope.transport_error().is_some() {
            if envelope.status_code() == 401 {
                // Token revoked or rotated remotely; next call re-authenticates.
                auth.store().invalidate(&endpoint.audience).await;
            }
            tracing::warn!(
                status = envelope.status_code(),
                error = envelope.transport_error().unwrap_or_default(),
                "Partner API request failed"
            );
            return Err(TransportError::Rejected(Box::new(envelope)).into());
        }

        Ok(envelope)
    }
}

impl std::fmt::Debug for GraphQLClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLClient")
            .field("endpoint", &self.inner.endpoint.url.as_str())
            .field("audience", &self.inner.endpoint.audience)
            .finish_non_exhaustive()
    }
}

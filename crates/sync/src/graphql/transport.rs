//! HTTP transport seam.
//!
//! The client composes fully signed requests and hands them to a
//! [`Transport`]. Production uses [`ReqwestTransport`]; tests can inject
//! anything that implements the trait.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::TransportError;
use super::response::ResponseEnvelope;

/// A fully composed outbound request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, including any query string.
    pub url: Url,
    /// Request headers (including `Authorization`, marked sensitive).
    pub headers: HeaderMap,
    /// JSON body, if any.
    pub body: Option<Value>,
}

/// Executes composed requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the raw response.
    ///
    /// A transport may report a non-2xx response either as `Ok` with a
    /// non-empty transport error on the envelope, or not at all.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if no response was received.
    async fn send(&self, request: TransportRequest) -> Result<ResponseEnvelope, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
///
/// Non-2xx responses are returned with the transport error set to
/// `"HTTP <code> <reason>"` so callers still see status, headers and body.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with its own client and the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Client` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self::with_client(build_http_client(timeout)?))
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Build the shared HTTP client.
///
/// # Errors
///
/// Returns `TransportError::Client` if the TLS backend cannot be initialized.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TransportError::Client(e.to_string()))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<ResponseEnvelope, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let reason = status.canonical_reason().unwrap_or_default();
        let transport_error =
            (!status.is_success()).then(|| format!("HTTP {} {reason}", status.as_u16()));
        debug!(status = status.as_u16(), "received partner API response");

        Ok(ResponseEnvelope::new(
            status.as_u16(),
            reason,
            headers,
            body,
            transport_error,
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn request(server: &MockServer, method: Method, body: Option<Value>) -> TransportRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-integration-agent", HeaderValue::from_static("test-agent"));
        TransportRequest {
            method,
            url: Url::parse(&format!("{}/graphql", server.uri())).unwrap(),
            headers,
            body,
        }
    }

    #[tokio::test]
    async fn test_success_has_no_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header("x-integration-agent", "test-agent"))
            .and(body_json(serde_json::json!({"query": "{ shop }"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":{}}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let envelope = transport
            .send(request(
                &server,
                Method::POST,
                Some(serde_json::json!({"query": "{ shop }"})),
            ))
            .await
            .unwrap();

        assert_eq!(envelope.status_code(), 200);
        assert_eq!(envelope.reason_phrase(), "OK");
        assert!(envelope.transport_error().is_none());
        assert_eq!(envelope.body(), r#"{"data":{}}"#);
    }

    #[tokio::test]
    async fn test_non_2xx_keeps_body_and_sets_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(503)
                    .insert_header("retry-after", "30")
                    .set_body_string("maintenance"),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let envelope = transport
            .send(request(&server, Method::GET, None))
            .await
            .unwrap();

        assert_eq!(envelope.status_code(), 503);
        assert_eq!(envelope.transport_error(), Some("HTTP 503 Service Unavailable"));
        assert_eq!(envelope.body(), "maintenance");
        assert_eq!(envelope.headers().get("retry-after").unwrap(), "30");
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(Duration::from_millis(50)).unwrap();
        let err = transport
            .send(request(&server, Method::GET, None))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport
            .send(TransportRequest {
                method: Method::GET,
                url: Url::parse("http://127.0.0.1:1/graphql").unwrap(),
                headers: HeaderMap::new(),
                body: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Network(_)));
    }
}

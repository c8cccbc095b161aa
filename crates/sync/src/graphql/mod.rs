//! Partner GraphQL API client.
//!
//! # Architecture
//!
//! - Every call runs the same signing path: refresh the audience's token,
//!   render the bearer header, compose headers, log, dispatch
//! - Dispatch goes through an injected [`Transport`]
//! - Results come back as a [`ResponseEnvelope`], which normalizes the
//!   partner's inconsistent error shapes
//!
//! Application-level errors in a response body are data, not `Err`: callers
//! inspect [`ResponseEnvelope::error`]. Only authentication and transport
//! failures abort a call.

pub mod client;
pub mod response;
pub mod transport;

use reqwest::Method;
use serde_json::{Map, Value};
use thiserror::Error;

pub use client::GraphQLClient;
pub use response::{NormalizedError, ResponseEnvelope};
pub use transport::{ReqwestTransport, Transport, TransportRequest};

/// Errors raised while executing a request over the wire.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed or the response could not be read.
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded the HTTP timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A response arrived but the transport flagged it as failed
    /// (e.g. non-2xx). The full envelope is attached for diagnostics.
    #[error("{}", .0.transport_error().unwrap_or("Request failed"))]
    Rejected(Box<ResponseEnvelope>),

    /// The request could not be composed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    Client(String),
}

impl TransportError {
    /// The response envelope, when one was received.
    #[must_use]
    pub fn envelope(&self) -> Option<&ResponseEnvelope> {
        match self {
            Self::Rejected(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// HTTP status code, when a response was received.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.envelope().map(ResponseEnvelope::status_code)
    }
}

/// A single GraphQL call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// GraphQL document.
    pub query: String,
    /// HTTP method (default `POST`).
    pub method: Method,
    /// Query variables.
    pub variables: Map<String, Value>,
}

impl QueryRequest {
    /// A `POST` request with no variables.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            method: Method::POST,
            variables: Map::new(),
        }
    }

    /// Use a different HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set the query variables.
    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// JSON body `{ "query": ..., "variables": ... }`.
    #[must_use]
    pub fn body(&self) -> Value {
        serde_json::json!({
            "query": self.query,
            "variables": self.variables,
        })
    }
}

/// Parse an HTTP method name case-insensitively (`"post"`, `"GET"`, ...).
///
/// # Errors
///
/// Returns `TransportError::InvalidRequest` for names that are not valid
/// HTTP method tokens.
pub fn parse_method(name: &str) -> Result<Method, TransportError> {
    Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| TransportError::InvalidRequest(format!("invalid HTTP method: {name}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderMap;

    use super::*;

    #[test]
    fn test_query_request_defaults_to_post() {
        let request = QueryRequest::new("{ warehouses { id } }");
        assert_eq!(request.method, Method::POST);
        assert!(request.variables.is_empty());
        assert_eq!(
            request.body(),
            serde_json::json!({"query": "{ warehouses { id } }", "variables": {}})
        );
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("post").unwrap(), Method::POST);
        assert_eq!(parse_method(" Get ").unwrap(), Method::GET);
        assert!(parse_method("no method").is_err());
    }

    #[test]
    fn test_rejected_error_exposes_envelope() {
        let envelope = ResponseEnvelope::new(
            502,
            "Bad Gateway",
            HeaderMap::new(),
            "upstream down",
            Some("HTTP 502 Bad Gateway".to_string()),
        );
        let err = TransportError::Rejected(Box::new(envelope));

        assert_eq!(err.to_string(), "HTTP 502 Bad Gateway");
        assert_eq!(err.status_code(), Some(502));
        assert_eq!(err.envelope().unwrap().body(), "upstream down");
    }

    #[test]
    fn test_network_error_has_no_envelope() {
        let err = TransportError::Network("connection refused".to_string());
        assert!(err.envelope().is_none());
        assert_eq!(err.to_string(), "Network error: connection refused");
    }
}

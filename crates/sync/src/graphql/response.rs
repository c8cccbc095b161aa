//! Uniform view over partner API responses.
//!
//! The partner reports errors in three different places depending on the
//! endpoint: a transport-level error, an `error` key in the JSON body, or a
//! GraphQL-style `errors` key in the JSON body. [`ResponseEnvelope`] hides
//! that behind one contract, with the transport-level error taking
//! precedence, then `error`, then `errors`.

use std::sync::OnceLock;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Normalized error extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedError {
    /// Error reported by the transport (e.g. a non-2xx status).
    Transport(String),
    /// Value of the body's `error` key.
    BodyError(Value),
    /// Value of the body's `errors` key.
    BodyErrors(Value),
}

impl NormalizedError {
    /// The raw error payload as JSON.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::Transport(message) => Value::String(message.clone()),
            Self::BodyError(value) | Self::BodyErrors(value) => value.clone(),
        }
    }

    /// Flatten the error into human-readable messages.
    ///
    /// Understands plain strings, GraphQL `{ "message": ... }` objects and
    /// arrays of either; anything else is rendered as compact JSON.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match self {
            Self::Transport(message) => vec![message.clone()],
            Self::BodyError(value) | Self::BodyErrors(value) => match value {
                Value::Array(items) => items.iter().map(message_of).collect(),
                other => vec![message_of(other)],
            },
        }
    }
}

impl std::fmt::Display for NormalizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

fn message_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => value.to_string(),
        },
        other => other.to_string(),
    }
}

/// Whether a JSON value carries information (`null`, `false`, `""`, `[]`
/// and `{}` do not).
fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(true) | Value::Number(_) => true,
    }
}

/// Immutable result of one partner API call.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    status_code: u16,
    reason_phrase: String,
    headers: HeaderMap,
    body: String,
    transport_error: Option<String>,
    parsed_body: OnceLock<Option<Value>>,
}

impl ResponseEnvelope {
    /// Wrap a transport result.
    #[must_use]
    pub fn new(
        status_code: u16,
        reason_phrase: impl Into<String>,
        headers: HeaderMap,
        body: impl Into<String>,
        transport_error: Option<String>,
    ) -> Self {
        Self {
            status_code,
            reason_phrase: reason_phrase.into(),
            headers,
            body: body.into(),
            transport_error,
            parsed_body: OnceLock::new(),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.status_code
    }

    /// HTTP reason phrase.
    #[must_use]
    pub fn reason_phrase(&self) -> &str {
        &self.reason_phrase
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Transport-level error, if the transport reported a non-empty one.
    #[must_use]
    pub fn transport_error(&self) -> Option<&str> {
        self.transport_error
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }

    /// The body parsed as JSON, or `None` if it is empty or not valid JSON.
    ///
    /// Parsed lazily on first access and cached.
    #[must_use]
    pub fn body_as_json(&self) -> Option<&Value> {
        self.parsed_body
            .get_or_init(|| serde_json::from_str(&self.body).ok())
            .as_ref()
    }

    /// Deserialize the body into `T`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// Whether any of the three error shapes is present and non-empty.
    ///
    /// Never fails: an unparsable body only means no body-derived error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.error().is_some()
    }

    /// The error this response reports, by precedence: transport-level
    /// error, then the body's `error` key, then the body's `errors` key.
    #[must_use]
    pub fn error(&self) -> Option<NormalizedError> {
        if let Some(message) = self.transport_error() {
            return Some(NormalizedError::Transport(message.to_owned()));
        }

        let body = self.body_as_json()?.as_object()?;

        if let Some(error) = body.get("error").filter(|v| is_non_empty(v)) {
            return Some(NormalizedError::BodyError(error.clone()));
        }

        body.get("errors")
            .filter(|v| is_non_empty(v))
            .map(|errors| NormalizedError::BodyErrors(errors.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn envelope(body: &str, transport_error: Option<&str>) -> ResponseEnvelope {
        ResponseEnvelope::new(
            200,
            "OK",
            HeaderMap::new(),
            body,
            transport_error.map(ToString::to_string),
        )
    }

    #[test]
    fn test_body_errors_key() {
        let response = envelope(r#"{"errors":["bad input"]}"#, None);
        assert!(response.has_errors());
        assert_eq!(
            response.error(),
            Some(NormalizedError::BodyErrors(json!(["bad input"])))
        );
    }

    #[test]
    fn test_body_error_key() {
        let response = envelope(r#"{"error":"unknown warehouse"}"#, None);
        assert!(response.has_errors());
        assert_eq!(
            response.error(),
            Some(NormalizedError::BodyError(json!("unknown warehouse")))
        );
    }

    #[test]
    fn test_error_key_takes_precedence_over_errors() {
        let response = envelope(r#"{"error":"first","errors":["second"]}"#, None);
        assert_eq!(
            response.error(),
            Some(NormalizedError::BodyError(json!("first")))
        );
    }

    #[test]
    fn test_transport_error_takes_precedence_over_body() {
        let response = envelope(r#"{"errors":["body"]}"#, Some("HTTP 502 Bad Gateway"));
        assert_eq!(
            response.error(),
            Some(NormalizedError::Transport("HTTP 502 Bad Gateway".to_string()))
        );
    }

    #[test]
    fn test_unparsable_body_has_no_errors() {
        let response = envelope("<html>oops</html>", None);
        assert!(!response.has_errors());
        assert!(response.error().is_none());
        assert!(response.body_as_json().is_none());
    }

    #[test]
    fn test_unparsable_body_with_transport_error() {
        let response = envelope("<html>oops</html>", Some("HTTP 500 Internal Server Error"));
        assert!(response.has_errors());
    }

    #[test]
    fn test_empty_body_has_no_errors() {
        let response = envelope("", None);
        assert!(!response.has_errors());
        assert!(response.body_as_json().is_none());
    }

    #[test]
    fn test_empty_values_are_not_errors() {
        for body in [
            r#"{"error":null}"#,
            r#"{"error":""}"#,
            r#"{"errors":[]}"#,
            r#"{"errors":{}}"#,
            r#"{"error":false,"errors":null}"#,
            r#"{"data":{"ok":true}}"#,
        ] {
            assert!(!envelope(body, None).has_errors(), "{body}");
        }
    }

    #[test]
    fn test_empty_error_falls_through_to_errors() {
        let response = envelope(r#"{"error":"","errors":["real"]}"#, None);
        assert_eq!(
            response.error(),
            Some(NormalizedError::BodyErrors(json!(["real"])))
        );
    }

    #[test]
    fn test_blank_transport_error_is_ignored() {
        let response = envelope(r#"{"data":{}}"#, Some("  "));
        assert!(response.transport_error().is_none());
        assert!(!response.has_errors());
    }

    #[test]
    fn test_non_object_body_has_no_errors() {
        assert!(!envelope(r#"["error"]"#, None).has_errors());
        assert!(!envelope("42", None).has_errors());
    }

    #[test]
    fn test_messages_from_graphql_errors() {
        let response = envelope(
            r#"{"errors":[{"message":"Field 'sku' missing","locations":[]},"plain"]}"#,
            None,
        );
        let error = response.error().unwrap();
        assert_eq!(
            error.messages(),
            vec!["Field 'sku' missing".to_string(), "plain".to_string()]
        );
        assert_eq!(error.to_string(), "Field 'sku' missing; plain");
    }

    #[test]
    fn test_messages_fall_back_to_json() {
        let error = NormalizedError::BodyError(json!({"code": 42}));
        assert_eq!(error.messages(), vec![r#"{"code":42}"#.to_string()]);
    }

    #[test]
    fn test_json_typed_body() {
        #[derive(serde::Deserialize)]
        struct Ack {
            ok: bool,
        }
        let response = envelope(r#"{"ok":true}"#, None);
        assert!(response.json::<Ack>().unwrap().ok);
        assert_eq!(response.body_as_json(), Some(&json!({"ok": true})));
    }
}

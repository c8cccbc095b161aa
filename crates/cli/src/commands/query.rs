//! Ad-hoc GraphQL queries against the partner API.
//!
//! # Usage
//!
//! ```bash
//! psync query 'query($first: Int) { warehouses(first: $first) { id } }' \
//!     --variables '{"first": 10}'
//!
//! # Send as URL parameters instead of a JSON body
//! psync query '{ shop { id } }' --method GET
//! ```

use partner_sync::graphql::parse_method;
use partner_sync::{GraphQLClient, QueryRequest, SyncConfig, SyncError};
use serde_json::{Map, Value};

use crate::CliError;

/// Execute `query` and print the response body (pretty-printed when it is
/// JSON). Errors reported in the body are logged, not fatal.
#[allow(clippy::print_stdout)]
pub async fn execute(
    config: &SyncConfig,
    query: &str,
    variables: Option<&str>,
    method: &str,
) -> Result<(), CliError> {
    let method = parse_method(method).map_err(SyncError::from)?;
    let request = QueryRequest::new(query)
        .method(method)
        .variables(parse_variables(variables)?);

    let client = GraphQLClient::from_config(config)?;
    let envelope = client.execute(&request).await?;

    if let Some(error) = envelope.error() {
        tracing::warn!(%error, "Query returned errors");
    }

    match envelope.body_as_json() {
        Some(json) => println!("{}", serde_json::to_string_pretty(json)?),
        None => println!("{}", envelope.body()),
    }
    Ok(())
}

/// Parse `--variables`; absent means no variables.
fn parse_variables(raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CliError::InvalidVariables(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(CliError::InvalidVariables(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variables_absent() {
        assert!(parse_variables(None).unwrap_or_default().is_empty());
    }

    #[test]
    fn test_parse_variables_object() {
        let vars = parse_variables(Some(r#"{"first": 10, "after": null}"#))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(vars.get("first"), Some(&Value::from(10)));
        assert_eq!(vars.get("after"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_variables_rejects_non_objects() {
        assert!(matches!(
            parse_variables(Some("[1, 2]")),
            Err(CliError::InvalidVariables(_))
        ));
        assert!(matches!(
            parse_variables(Some("{first: 10")),
            Err(CliError::InvalidVariables(_))
        ));
    }
}

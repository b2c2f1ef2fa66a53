//! GraphQL transport.
//!
//! Every query is a POST of `{query, variables}` with the bearer token in the
//! `authorization` header. Failures are mapped onto [`FetchError`] here so the
//! cache can store them on entries and hand them to every subscriber.

use std::time::Duration;

use async_trait::async_trait;
use fightcache_core::FetchError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{AuthConfig, ClientConfig};
use crate::error::ClientError;

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a, V> {
    query: &'a str,
    variables: &'a V,
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<R> {
    data: Option<R>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorItem>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorItem {
    message: String,
}

#[derive(Clone)]
pub struct GraphQlClient {
    client: reqwest::Client,
    endpoint: String,
    auth_header: HeaderMap,
}

impl std::fmt::Debug for GraphQlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl GraphQlClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let auth_header = build_auth_headers(&config.auth)?;
        Ok(Self {
            client,
            endpoint: config.api_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one query and decode its `data` field into `R`.
    pub async fn query<V, R>(&self, query: &str, variables: &V) -> Result<R, FetchError>
    where
        V: Serialize + Sync,
        R: DeserializeOwned,
    {
        let body = GraphQlRequest { query, variables };
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.auth_header.clone())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;
        debug!(status = status.as_u16(), bytes = text.len(), "GraphQL response");
        check_status(status, &text)?;
        decode_envelope(&text)
    }
}

/// Runs a query and returns its decoded `data` as raw JSON.
///
/// The fetchers only depend on this seam, so they run unchanged against a
/// scripted executor in tests.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, FetchError>;
}

#[async_trait]
impl QueryExecutor for GraphQlClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, FetchError> {
        self.query(query, &variables).await
    }
}

fn build_auth_headers(auth: &AuthConfig) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = &auth.bearer_token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ClientError::InvalidHeader(e.to_string()))?,
        );
    }
    Ok(headers)
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::decode(err.to_string())
    } else {
        FetchError::network(err.to_string())
    }
}

/// Map an HTTP status onto a fetch failure. 401 is the expired-token case.
pub fn check_status(status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(FetchError::Unauthorized);
    }
    let message = match decode_envelope::<Value>(body) {
        Err(FetchError::GraphQl { messages }) => messages.join("; "),
        _ => body.chars().take(200).collect(),
    };
    Err(FetchError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Decode a `{data, errors}` response body.
///
/// Any entry in `errors` fails the whole query, even alongside partial data.
pub fn decode_envelope<R: DeserializeOwned>(body: &str) -> Result<R, FetchError> {
    let envelope: GraphQlEnvelope<R> =
        serde_json::from_str(body).map_err(|e| FetchError::decode(e.to_string()))?;
    if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
        return Err(FetchError::GraphQl {
            messages: errors.into_iter().map(|e| e.message).collect(),
        });
    }
    envelope
        .data
        .ok_or_else(|| FetchError::decode("response carried neither data nor errors"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn test_decode_data() {
        let out: Payload = decode_envelope(r#"{"data": {"value": 7}}"#).unwrap();
        assert_eq!(out, Payload { value: 7 });
    }

    #[test]
    fn test_decode_errors_win_over_partial_data() {
        let body = r#"{"data": {"value": 1}, "errors": [{"message": "a"}, {"message": "b"}]}"#;
        let err = decode_envelope::<Payload>(body).unwrap_err();
        assert_eq!(
            err,
            FetchError::GraphQl {
                messages: vec!["a".to_string(), "b".to_string()]
            }
        );
    }

    #[test]
    fn test_decode_missing_data() {
        let err = decode_envelope::<Payload>(r#"{"errors": []}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        let err = decode_envelope::<Payload>("<html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(StatusCode::OK, "").is_ok());
        assert_eq!(
            check_status(StatusCode::UNAUTHORIZED, "").unwrap_err(),
            FetchError::Unauthorized
        );
        assert_eq!(
            check_status(
                StatusCode::TOO_MANY_REQUESTS,
                r#"{"errors": [{"message": "rate limited"}]}"#
            )
            .unwrap_err(),
            FetchError::Status {
                status: 429,
                message: "rate limited".to_string()
            }
        );
        assert_eq!(
            check_status(StatusCode::BAD_GATEWAY, "upstream down").unwrap_err(),
            FetchError::Status {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn test_auth_header() {
        let headers = build_auth_headers(&AuthConfig {
            bearer_token: Some("tok".to_string()),
        })
        .unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Bearer tok");

        let err = build_auth_headers(&AuthConfig {
            bearer_token: Some("bad\ntoken".to_string()),
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidHeader(_)));
    }
}

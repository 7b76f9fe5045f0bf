//! The HTTP transport seam.
//!
//! [`Transport`] performs exactly one HTTP exchange and knows nothing about
//! Checkmk.  Every status code comes back as an [`HttpResponse`]; only
//! failures that produced no response at all are errors.  Header names are
//! normalized through [`HeaderMap`] at this boundary, so nothing above it
//! has to care how the server cased them.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::config::TransportSettings;
use crate::error::{ClientError, Result};

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

/// A case-insensitive header map.
///
/// Names are stored lowercased; inserting a name that differs only in case
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.entries
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Look a header up regardless of the casing used by either side.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Copy every entry of `other` into `self`, overriding duplicates.
    pub fn extend(&mut self, other: &HeaderMap) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }

    /// Iterate over `(lowercase name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl From<&reqwest::header::HeaderMap> for HeaderMap {
    fn from(headers: &reqwest::header::HeaderMap) -> Self {
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

/// One fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL without the query string.
    pub url: String,
    pub headers: HeaderMap,
    /// Query parameters in send order; repeated keys are allowed.
    pub query: Vec<(String, String)>,
    /// JSON body, `None` for body-less requests.
    pub body: Option<Value>,
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Undecoded response body.
    pub body: String,
}

impl HttpResponse {
    /// A response carrying `body` serialized as JSON.
    pub fn json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json");
        Self {
            status,
            headers,
            body: body.to_string(),
        }
    }

    /// A response without a body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    /// Add a header (builder style).
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A failure that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportFailure {
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("{0}")]
    Network(String),
}

impl TransportFailure {
    /// Attach the endpoint the failure happened on.
    pub(crate) fn into_client_error(self, endpoint: &str) -> ClientError {
        match self {
            Self::Timeout { seconds } => ClientError::Timeout {
                endpoint: endpoint.to_string(),
                seconds,
            },
            Self::Network(reason) => ClientError::Transport {
                endpoint: endpoint.to_string(),
                reason,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Performs one HTTP exchange.
///
/// Timeouts and cancellation are the implementation's concern; callers
/// above this trait never impose their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportFailure>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl ReqwestTransport {
    /// Build a transport from the configured settings.
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: settings.timeout_secs,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportFailure> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportFailure::Timeout {
                    seconds: self.timeout_secs,
                }
            } else {
                TransportFailure::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = HeaderMap::from(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::Network(format!("failed to read response body: {e}")))?;

        debug!(
            method = %request.method,
            url = %request.url,
            status = status,
            body_length = body.len(),
            "HTTP exchange completed"
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let mut headers = HeaderMap::new();
        headers.insert("ETag", "\"abc\"");
        assert_eq!(headers.get("etag"), Some("\"abc\""));
        assert_eq!(headers.get("ETAG"), Some("\"abc\""));
        assert!(headers.contains("Etag"));
    }

    #[test]
    fn header_insert_replaces_differently_cased_name() {
        let mut headers = HeaderMap::new();
        headers.insert("If-Match", "\"one\"");
        headers.insert("if-match", "\"two\"");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("IF-MATCH"), Some("\"two\""));
    }

    #[test]
    fn header_extend_overrides() {
        let mut base: HeaderMap = [("Accept", "application/json"), ("X-Test", "a")]
            .into_iter()
            .collect();
        let extra: HeaderMap = [("x-test", "b")].into_iter().collect();
        base.extend(&extra);
        assert_eq!(base.get("X-Test"), Some("b"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn converts_from_reqwest_headers() {
        let mut raw = reqwest::header::HeaderMap::new();
        raw.insert("etag", reqwest::header::HeaderValue::from_static("W/\"x\""));
        let headers = HeaderMap::from(&raw);
        assert_eq!(headers.get("ETag"), Some("W/\"x\""));
    }

    #[test]
    fn json_response_helper_serializes_body() {
        let response = HttpResponse::json(200, &serde_json::json!({"id": "srv1"}));
        assert!(response.is_success());
        assert_eq!(response.headers.get("content-type"), Some("application/json"));
        assert!(response.body.contains("srv1"));
        assert!(!HttpResponse::empty(412).is_success());
    }

    #[test]
    fn transport_failure_maps_to_client_error() {
        let err = TransportFailure::Timeout { seconds: 5 }.into_client_error("/version");
        assert!(matches!(err, ClientError::Timeout { seconds: 5, .. }));
        let err = TransportFailure::Network("reset".into()).into_client_error("/version");
        assert_eq!(err.endpoint(), Some("/version"));
    }

    #[test]
    fn reqwest_transport_builds_from_settings() {
        assert!(ReqwestTransport::new(&TransportSettings::default()).is_ok());
    }
}

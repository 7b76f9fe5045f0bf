//! The basic request wrapper.
//!
//! [`CheckmkClient::request`] turns a [`RequestSpec`] into a fully resolved
//! HTTP request (base URL, auth, content negotiation), sends it through the
//! configured [`Transport`], and folds every failure into one
//! [`ClientError`].  It never retries and never interprets status codes
//! beyond success / failure; that is left to the callers in
//! [`crate::conditional`] and [`crate::pagination`].

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::CheckmkConfig;
use crate::credentials::Credentials;
use crate::error::{ClientError, Result};
use crate::transport::{HeaderMap, HttpRequest, ReqwestTransport, Transport};

/// Longest raw body excerpt quoted in an error message.
const MAX_ERROR_EXCERPT: usize = 512;

// ---------------------------------------------------------------------------
// RequestSpec
// ---------------------------------------------------------------------------

/// What to call: built fresh for every request and consumed by it.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    /// Endpoint below the API root (`/objects/host_config/srv1`), or an
    /// absolute URL handed out by the server.
    pub path: String,
    pub body: Value,
    pub query: Vec<(String, String)>,
    /// Headers that add to or override the standard set.
    pub extra_headers: HeaderMap,
}

impl RequestSpec {
    /// A request with an empty JSON object body and no query.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Value::Object(Map::new()),
            query: Vec::new(),
            extra_headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Append one query parameter; repeated keys are kept in order.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name, value);
        self
    }

    /// Whether the body should go on the wire.  GET, HEAD and DELETE never
    /// carry the default empty object.
    fn wire_body(&self) -> Option<Value> {
        let empty_object = matches!(&self.body, Value::Object(map) if map.is_empty());
        let bodyless = matches!(self.method, Method::GET | Method::HEAD | Method::DELETE);
        if self.body.is_null() || (bodyless && empty_object) {
            None
        } else {
            Some(self.body.clone())
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A decoded response, headers included.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    /// Parsed JSON body; `Null` when the server sent no body.
    pub body: Value,
}

/// Stateless Checkmk REST API client.
///
/// The client holds only the transport.  Credentials are passed into every
/// call so that one client can serve any number of sites.
#[derive(Clone)]
pub struct CheckmkClient {
    transport: Arc<dyn Transport>,
}

impl CheckmkClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Build a client with the `reqwest` transport described by `config`.
    pub fn from_config(config: &CheckmkConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Resolve an endpoint to an absolute URL.
    ///
    /// Absolute URLs (pagination links) pass through only when they share
    /// the origin of `credentials.host`; any other origin is an
    /// [`ClientError::InvalidResponse`], so the `Authorization` header is
    /// never sent off-site.  Paths that already start with the site's API
    /// path are joined to the host only; anything else is taken relative to
    /// the API root.
    pub fn url_for(credentials: &Credentials, path: &str) -> Result<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            ensure_same_origin(credentials, path)?;
            return Ok(path.to_string());
        }
        let api_path = credentials.api_path();
        if path.starts_with(&api_path) {
            return Ok(format!("{}{path}", credentials.host));
        }
        if path.starts_with('/') {
            Ok(format!("{}{path}", credentials.base_url()))
        } else {
            Ok(format!("{}/{path}", credentials.base_url()))
        }
    }

    fn build_request(credentials: &Credentials, spec: &RequestSpec) -> Result<HttpRequest> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", "application/json");
        headers.insert("Accept", "application/json");
        headers.insert("Authorization", credentials.authorization());
        headers.extend(&spec.extra_headers);

        Ok(HttpRequest {
            method: spec.method.clone(),
            url: Self::url_for(credentials, &spec.path)?,
            headers,
            query: spec.query.clone(),
            body: spec.wire_body(),
        })
    }

    /// Send a request and return the full decoded response.
    pub async fn execute(&self, credentials: &Credentials, spec: RequestSpec) -> Result<ApiResponse> {
        let request = Self::build_request(credentials, &spec)?;
        debug!(method = %request.method, url = %request.url, "sending Checkmk API request");

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|failure| failure.into_client_error(&spec.path))?;

        if !response.is_success() {
            return Err(ClientError::Api {
                endpoint: spec.path,
                status: response.status,
                message: error_message(response.status, &response.body),
            });
        }

        let body = parse_body(&spec.path, &response.body)?;
        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body,
        })
    }

    /// Send a request and return only its JSON body.
    pub async fn request(&self, credentials: &Credentials, spec: RequestSpec) -> Result<Value> {
        Ok(self.execute(credentials, spec).await?.body)
    }
}

impl std::fmt::Debug for CheckmkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckmkClient").finish_non_exhaustive()
    }
}

/// Reject an absolute link whose scheme, host or port differ from the
/// configured site host.
fn ensure_same_origin(credentials: &Credentials, link: &str) -> Result<()> {
    let site = Url::parse(&credentials.host)
        .map_err(|e| ClientError::Config(format!("invalid host `{}`: {e}", credentials.host)))?;
    let foreign = |reason: String| ClientError::InvalidResponse {
        endpoint: link.to_string(),
        reason,
    };
    let target = Url::parse(link).map_err(|e| foreign(format!("link is not a valid URL: {e}")))?;
    if target.origin() != site.origin() {
        return Err(foreign(format!(
            "link points outside the configured host `{}`",
            credentials.host
        )));
    }
    Ok(())
}

fn parse_body(endpoint: &str, raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(raw).map_err(|e| ClientError::InvalidResponse {
        endpoint: endpoint.to_string(),
        reason: format!("body is not valid JSON: {e}"),
    })
}

/// Extract a readable message from a Checkmk problem document
/// (`{"title", "detail", "fields"}`), falling back to the raw body.
fn error_message(status: u16, raw: &str) -> String {
    if let Ok(Value::Object(problem)) = serde_json::from_str::<Value>(raw) {
        let title = problem.get("title").and_then(Value::as_str);
        let detail = problem.get("detail").and_then(Value::as_str);
        let mut message = match (title, detail) {
            (Some(t), Some(d)) => format!("{t}: {d}"),
            (Some(t), None) => t.to_string(),
            (None, Some(d)) => d.to_string(),
            (None, None) => String::new(),
        };
        if let Some(fields) = problem.get("fields").filter(|f| !f.is_null()) {
            message.push_str(&format!(" (fields: {fields})"));
        }
        if !message.is_empty() {
            return message;
        }
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    match trimmed.char_indices().nth(MAX_ERROR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::MockTransport;
    use crate::transport::HttpResponse;

    fn creds() -> Credentials {
        Credentials::new("https://cmk.example.com", "mysite", "automation", "secret")
    }

    fn client(mock: &Arc<MockTransport>) -> CheckmkClient {
        CheckmkClient::new(mock.clone())
    }

    #[test]
    fn url_for_relative_endpoint() {
        assert_eq!(
            CheckmkClient::url_for(&creds(), "/version").unwrap(),
            "https://cmk.example.com/mysite/check_mk/api/1.0/version"
        );
        assert_eq!(
            CheckmkClient::url_for(&creds(), "version").unwrap(),
            "https://cmk.example.com/mysite/check_mk/api/1.0/version"
        );
    }

    #[test]
    fn url_for_absolute_and_site_relative_links() {
        let absolute = "https://cmk.example.com/mysite/check_mk/api/1.0/domain-types/host_config/collections/all?page=2";
        assert_eq!(CheckmkClient::url_for(&creds(), absolute).unwrap(), absolute);
        assert_eq!(
            CheckmkClient::url_for(&creds(), "/mysite/check_mk/api/1.0/objects/host_config/a")
                .unwrap(),
            "https://cmk.example.com/mysite/check_mk/api/1.0/objects/host_config/a"
        );
    }

    #[test]
    fn url_for_rejects_links_to_other_origins() {
        for link in [
            "https://attacker.example.net/mysite/check_mk/api/1.0/objects/host_config/a",
            "https://cmk.example.com.attacker.example.net/mysite/check_mk/api/1.0/version",
            "http://cmk.example.com/mysite/check_mk/api/1.0/version",
            "https://cmk.example.com:8443/mysite/check_mk/api/1.0/version",
        ] {
            let err = CheckmkClient::url_for(&creds(), link).unwrap_err();
            assert!(matches!(err, ClientError::InvalidResponse { .. }), "{link}");
        }
    }

    #[tokio::test]
    async fn foreign_link_is_never_sent() {
        let mock = Arc::new(MockTransport::new());
        let err = client(&mock)
            .request(
                &creds(),
                RequestSpec::get("https://attacker.example.net/collect?page=2"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse { .. }));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn wire_body_skips_empty_object_for_reads_and_deletes() {
        assert_eq!(RequestSpec::get("/version").wire_body(), None);
        assert_eq!(RequestSpec::delete("/objects/x/y").wire_body(), None);
        assert_eq!(RequestSpec::post("/a").wire_body(), Some(json!({})));
        assert_eq!(
            RequestSpec::delete("/a").with_body(json!({"k": 1})).wire_body(),
            Some(json!({"k": 1}))
        );
    }

    #[tokio::test]
    async fn request_sets_standard_headers() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"versions": {"checkmk": "2.3.0"}}));

        let body = client(&mock)
            .request(&creds(), RequestSpec::get("/version"))
            .await
            .unwrap();
        assert_eq!(body["versions"]["checkmk"], "2.3.0");

        let sent = mock.requests();
        assert_eq!(sent.len(), 1);
        let headers = &sent[0].headers;
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("accept"), Some("application/json"));
        assert_eq!(headers.get("authorization"), Some("Bearer automation secret"));
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(sent[0].body, None);
    }

    #[tokio::test]
    async fn extra_headers_override_defaults() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({}));

        let spec = RequestSpec::put("/objects/host_config/srv1")
            .with_header("If-Match", "\"abc\"")
            .with_header("accept", "application/problem+json")
            .with_query("effective_attributes", "true");
        client(&mock).request(&creds(), spec).await.unwrap();

        let sent = &mock.requests()[0];
        assert_eq!(sent.headers.get("If-Match"), Some("\"abc\""));
        assert_eq!(sent.headers.get("Accept"), Some("application/problem+json"));
        assert_eq!(
            sent.query,
            vec![("effective_attributes".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error_with_problem_text() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            400,
            json!({"title": "Bad Request", "status": 400, "detail": "host_name is invalid"}),
        );

        let err = client(&mock)
            .request(&creds(), RequestSpec::post("/domain-types/host_config/collections/all"))
            .await
            .unwrap_err();
        match err {
            ClientError::Api {
                status, message, endpoint,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Bad Request: host_name is invalid");
                assert_eq!(endpoint, "/domain-types/host_config/collections/all");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn plain_text_error_body_is_quoted() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 502,
            headers: HeaderMap::new(),
            body: "Bad Gateway".into(),
        });

        let err = client(&mock)
            .request(&creds(), RequestSpec::get("/version"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[tokio::test]
    async fn malformed_json_is_an_invalid_response() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: "{not json".into(),
        });

        let err = client(&mock)
            .request(&creds(), RequestSpec::get("/version"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn empty_body_decodes_to_null() {
        let mock = Arc::new(MockTransport::new());
        mock.push_response(HttpResponse::empty(204));

        let body = client(&mock)
            .request(&creds(), RequestSpec::delete("/objects/host_config/srv1"))
            .await
            .unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn network_failure_keeps_endpoint() {
        let mock = Arc::new(MockTransport::new());
        mock.push_failure(crate::transport::TransportFailure::Network("connection refused".into()));

        let err = client(&mock)
            .request(&creds(), RequestSpec::get("/version"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport { .. }));
        assert_eq!(err.endpoint(), Some("/version"));
    }

    #[test]
    fn error_message_truncates_long_bodies() {
        let long = "x".repeat(2_000);
        let message = error_message(500, &long);
        assert!(message.ends_with("..."));
        assert!(message.len() < 600);
        assert_eq!(error_message(503, "  "), "HTTP 503");
    }
}

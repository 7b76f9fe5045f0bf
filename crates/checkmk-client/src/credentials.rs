//! Checkmk API credentials and the credential-store seam.
//!
//! Credentials are never held in module-level state: callers obtain them
//! from a [`CredentialProvider`] once per invocation and pass them into every
//! client call.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Name under which the host's credential store keeps Checkmk credentials.
pub const CREDENTIAL_NAME: &str = "checkmkApi";

/// Path of the REST API below the site root.
const API_ROOT: &str = "check_mk/api/1.0";

/// Connection credentials for one Checkmk site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Server URL without the site, e.g. `https://monitoring.example.com`.
    pub host: String,
    /// Site name, e.g. `mysite`.
    pub site: String,
    /// Automation user name.
    pub username: String,
    /// Automation secret.
    pub password: String,
}

impl Credentials {
    /// Build credentials, trimming a trailing `/` from the host URL.
    pub fn new(
        host: impl Into<String>,
        site: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let mut credentials = Self {
            host: host.into(),
            site: site.into(),
            username: username.into(),
            password: password.into(),
        };
        credentials.normalize();
        credentials
    }

    /// Trim surrounding whitespace and the trailing `/` of the host.
    pub fn normalize(&mut self) {
        self.host = self.host.trim().trim_end_matches('/').to_string();
        self.site = self.site.trim().trim_matches('/').to_string();
        self.username = self.username.trim().to_string();
    }

    /// Root URL of the REST API: `{host}/{site}/check_mk/api/1.0`.
    pub fn base_url(&self) -> String {
        format!("{}/{}/{API_ROOT}", self.host, self.site)
    }

    /// Path component of [`Credentials::base_url`], used to recognise
    /// server-relative links.
    pub fn api_path(&self) -> String {
        format!("/{}/{API_ROOT}", self.site)
    }

    /// Value of the `Authorization` header for automation users.
    pub fn authorization(&self) -> String {
        format!("Bearer {} {}", self.username, self.password)
    }

    /// Check that every field is usable before any request is attempted.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.host)
            .map_err(|e| ClientError::Config(format!("invalid host URL `{}`: {e}", self.host)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "host URL `{}` must use http or https",
                self.host
            )));
        }
        for (field, value) in [
            ("site", &self.site),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Config(format!(
                    "credential field `{field}` must not be empty"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("site", &self.site)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The host's credential store.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Look up the credentials stored under `name`.
    async fn get_credentials(&self, name: &str) -> Result<Credentials>;
}

/// An in-memory credential store with a fixed set of entries.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<String, Credentials>,
}

impl StaticCredentials {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding `credentials` under [`CREDENTIAL_NAME`].
    pub fn checkmk(credentials: Credentials) -> Self {
        Self::new().with(CREDENTIAL_NAME, credentials)
    }

    /// Add (or replace) an entry.
    pub fn with(mut self, name: impl Into<String>, credentials: Credentials) -> Self {
        self.entries.insert(name.into(), credentials);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn get_credentials(&self, name: &str) -> Result<Credentials> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::Config(format!("no credentials stored under `{name}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials::new("https://monitoring.example.com/", "mysite", "automation", "s3cret")
    }

    #[test]
    fn base_url_joins_host_site_and_api_root() {
        assert_eq!(
            sample().base_url(),
            "https://monitoring.example.com/mysite/check_mk/api/1.0"
        );
        assert_eq!(sample().api_path(), "/mysite/check_mk/api/1.0");
    }

    #[test]
    fn authorization_uses_bearer_user_secret() {
        assert_eq!(sample().authorization(), "Bearer automation s3cret");
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", sample());
        assert!(rendered.contains("automation"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn validate_accepts_complete_credentials() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn validate_rejects_non_http_host() {
        let creds = Credentials::new("ftp://monitoring", "mysite", "u", "p");
        assert!(matches!(creds.validate(), Err(ClientError::Config(_))));
    }

    #[test]
    fn validate_rejects_relative_host() {
        let creds = Credentials::new("monitoring.example.com", "mysite", "u", "p");
        assert!(creds.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_password() {
        let creds = Credentials::new("https://m", "mysite", "u", " ");
        let err = creds.validate().unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[tokio::test]
    async fn static_store_resolves_by_name() {
        let store = StaticCredentials::checkmk(sample());
        let creds = store.get_credentials(CREDENTIAL_NAME).await.unwrap();
        assert_eq!(creds.site, "mysite");
        assert!(store.get_credentials("other").await.is_err());
    }
}

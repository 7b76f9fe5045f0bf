//! Client configuration.
//!
//! Configuration comes from a TOML file, from the environment (optionally
//! seeded from a `.env` file), or from both with environment values taking
//! precedence:
//!
//! ```toml
//! [credentials]
//! host = "https://monitoring.example.com"
//! site = "mysite"
//! username = "automation"
//! password = "secret"
//!
//! [transport]
//! timeout_secs = 30
//! accept_invalid_certs = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::credentials::Credentials;
use crate::error::{ClientError, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_HOST: &str = "CHECKMK_HOST";
const ENV_SITE: &str = "CHECKMK_SITE";
const ENV_USERNAME: &str = "CHECKMK_USERNAME";
const ENV_PASSWORD: &str = "CHECKMK_PASSWORD";
const ENV_TIMEOUT: &str = "CHECKMK_TIMEOUT_SECS";
const ENV_INSECURE: &str = "CHECKMK_ACCEPT_INVALID_CERTS";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("checkmk-adapter/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings handed to the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Skip TLS certificate verification (self-signed lab servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: false,
            user_agent: default_user_agent(),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckmkConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub transport: TransportSettings,
}

impl CheckmkConfig {
    /// Build a configuration from credentials with default transport
    /// settings.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            transport: TransportSettings::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse TOML config: {e}")))?;
        config.credentials.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), site = %config.credentials.site, "configuration loaded from file");
        Ok(config)
    }

    /// Build the configuration from `CHECKMK_*` environment variables,
    /// loading a `.env` file first when one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Override fields with any `CHECKMK_*` environment variables that are
    /// set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Check credentials and transport settings.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        if self.transport.timeout_secs == 0 {
            return Err(ClientError::Config(
                "transport timeout must be at least one second".into(),
            ));
        }
        Ok(())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClientError::Config(format!("environment variable `{key}` is not set")))
        };

        let credentials = Credentials::new(
            require(ENV_HOST)?,
            require(ENV_SITE)?,
            require(ENV_USERNAME)?,
            require(ENV_PASSWORD)?,
        );
        let mut config = Self::new(credentials);
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let credentials = &mut self.credentials;
        for (key, field) in [
            (ENV_HOST, &mut credentials.host),
            (ENV_SITE, &mut credentials.site),
            (ENV_USERNAME, &mut credentials.username),
            (ENV_PASSWORD, &mut credentials.password),
        ] {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
        credentials.normalize();

        if let Some(raw) = lookup(ENV_TIMEOUT) {
            self.transport.timeout_secs = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!("`{ENV_TIMEOUT}` must be a whole number of seconds, got `{raw}`"))
            })?;
        }
        if let Some(raw) = lookup(ENV_INSECURE) {
            self.transport.accept_invalid_certs = parse_flag(&raw).ok_or_else(|| {
                ClientError::Config(format!("`{ENV_INSECURE}` must be true or false, got `{raw}`"))
            })?;
        }

        self.validate()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

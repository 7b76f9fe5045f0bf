//! Checkmk adapter.
//!
//! Exposes one tool per resource (`checkmk_host`, `checkmk_downtime`, ...).
//! Each tool takes an `operation` plus that operation's parameters and
//! returns the output records as a JSON array.  Credentials are looked up
//! under `checkmkApi` for every invocation; nothing is cached between calls.

use std::sync::Arc;

use async_trait::async_trait;
use checkmk_client::{
    CREDENTIAL_NAME, CheckmkClient, CheckmkConfig, CredentialProvider, Credentials, RequestSpec,
    StaticCredentials,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::batch::{BatchItem, run_batch};
use crate::dispatcher::Resource;
use crate::error::{AdapterError, Result};
use crate::params::{JsonItems, ParameterSource};
use crate::traits::{Adapter, AuthRequirement, HealthStatus, ToolDefinition};

const VERSION_ENDPOINT: &str = "/version";

/// Checkmk REST API adapter.
pub struct CheckmkAdapter {
    /// Unique identifier for this adapter instance.
    id: String,
    /// Whether `connect` succeeded.
    connected: bool,
    client: CheckmkClient,
    credentials: Arc<dyn CredentialProvider>,
    /// Record per-item failures instead of aborting a tool call.
    continue_on_fail: bool,
}

impl CheckmkAdapter {
    pub fn new(id: &str, client: CheckmkClient, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            id: id.to_string(),
            connected: false,
            client,
            credentials,
            continue_on_fail: false,
        }
    }

    /// Build an adapter with the `reqwest` transport and the credentials
    /// from `config`.
    pub fn from_config(id: &str, config: &CheckmkConfig) -> Result<Self> {
        config.validate()?;
        let client = CheckmkClient::from_config(config)?;
        let credentials = StaticCredentials::checkmk(config.credentials.clone());
        Ok(Self::new(id, client, Arc::new(credentials)))
    }

    pub fn with_continue_on_fail(mut self, continue_on_fail: bool) -> Self {
        self.continue_on_fail = continue_on_fail;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    async fn resolve_credentials(&self) -> Result<Credentials> {
        let credentials = self
            .credentials
            .get_credentials(CREDENTIAL_NAME)
            .await
            .map_err(|e| {
                debug!(adapter = %self.id, error = %e, "credential lookup failed");
                AdapterError::AuthRequired {
                    adapter_id: self.id.clone(),
                    credential: CREDENTIAL_NAME.to_string(),
                }
            })?;
        credentials.validate()?;
        Ok(credentials)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run `resource`/`operation` over every item of `source`.
    pub async fn run_batch(
        &self,
        resource: &str,
        operation: &str,
        source: &dyn ParameterSource,
        continue_on_fail: bool,
    ) -> Result<Vec<BatchItem>> {
        let credentials = self.resolve_credentials().await?;
        run_batch(
            &self.client,
            &credentials,
            resource,
            operation,
            source,
            continue_on_fail,
        )
        .await
    }

    /// Fetch `/version`; used by `connect` and `health_check`.
    async fn version(&self, credentials: &Credentials) -> Result<Value> {
        Ok(self
            .client
            .request(credentials, RequestSpec::get(VERSION_ENDPOINT))
            .await?)
    }

    // -----------------------------------------------------------------------
    // Tool definitions
    // -----------------------------------------------------------------------

    fn tool_definition(resource: Resource) -> ToolDefinition {
        let operations: Vec<&str> = resource.operations().iter().map(|op| op.as_str()).collect();

        let mut properties = Map::new();
        properties.insert(
            "operation".into(),
            json!({
                "type": "string",
                "enum": operations,
                "description": "The operation to perform"
            }),
        );
        for (field, kind) in resource.fields() {
            properties.insert((*field).to_string(), json!({ "type": kind }));
        }

        ToolDefinition {
            name: resource.tool_name().to_string(),
            description: format!(
                "Checkmk {}: {}",
                resource.as_str(),
                operations.join(", ")
            ),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": ["operation"]
            }),
        }
    }
}

#[async_trait]
impl Adapter for CheckmkAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn connect(&mut self) -> Result<()> {
        let credentials = self.resolve_credentials().await?;
        let version = self.version(&credentials).await.map_err(|e| match e.status() {
            Some(401) | Some(403) => AdapterError::AuthRequired {
                adapter_id: self.id.clone(),
                credential: CREDENTIAL_NAME.to_string(),
            },
            _ => e,
        })?;

        let checkmk_version = version
            .pointer("/versions/checkmk")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(
            adapter = %self.id,
            site = %credentials.site,
            version = checkmk_version,
            "Checkmk adapter connected"
        );
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        info!(adapter = %self.id, "Checkmk adapter disconnected");
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        if !self.connected {
            return Ok(HealthStatus::Unhealthy);
        }
        let credentials = match self.resolve_credentials().await {
            Ok(credentials) => credentials,
            Err(_) => return Ok(HealthStatus::Unhealthy),
        };
        match self.version(&credentials).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => {
                warn!(adapter = %self.id, error = %e, "Checkmk health check failed");
                Ok(HealthStatus::Degraded)
            }
        }
    }

    fn tools(&self) -> Vec<ToolDefinition> {
        Resource::ALL
            .iter()
            .map(|resource| Self::tool_definition(*resource))
            .collect()
    }

    async fn execute_tool(&self, name: &str, params: Value) -> Result<Value> {
        if !self.connected {
            return Err(AdapterError::ExecutionFailed {
                tool_name: name.to_string(),
                reason: format!("adapter `{}` is not connected", self.id),
            });
        }

        let resource = Resource::from_tool_name(name).ok_or_else(|| AdapterError::ToolNotFound {
            adapter_id: self.id.clone(),
            tool_name: name.to_string(),
        })?;
        let operation = params
            .get("operation")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::invalid(name, "`operation` is required"))?;

        let source = JsonItems::single(params);
        let items = self
            .run_batch(resource.as_str(), &operation, &source, self.continue_on_fail)
            .await?;
        Ok(Value::Array(items.into_iter().map(|item| item.json).collect()))
    }

    fn required_auth(&self) -> Option<AuthRequirement> {
        Some(AuthRequirement {
            credential: CREDENTIAL_NAME.to_string(),
            fields: ["host", "site", "username", "password"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }
}

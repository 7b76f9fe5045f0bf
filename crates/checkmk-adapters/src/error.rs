//! Adapter error types.
//!
//! Everything that leaves the adapter boundary is an [`AdapterError`].
//! Client failures are folded into [`AdapterError::Api`] with the endpoint
//! involved and, where one exists, a remediation hint for the user.

use checkmk_client::ClientError;

/// Unified error type for the Checkmk adapter.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The requested tool does not exist on this adapter.
    #[error("tool not found: `{tool_name}` on adapter `{adapter_id}`")]
    ToolNotFound {
        adapter_id: String,
        tool_name: String,
    },

    /// The resource name is not part of the catalogue.
    #[error("unknown resource `{0}`")]
    UnknownResource(String),

    /// The resource exists but does not offer the operation.
    #[error("operation `{operation}` is not supported for resource `{resource}`")]
    UnsupportedOperation { resource: String, operation: String },

    /// A parameter is missing or malformed.  Raised before any request.
    #[error("invalid parameters for `{operation}`: {reason}")]
    InvalidParams { operation: String, reason: String },

    /// A tool invocation failed outside the API call itself.
    #[error("execution failed for tool `{tool_name}`: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    /// No usable credentials are configured for the adapter.
    #[error("authentication required for adapter `{adapter_id}`: credential={credential}")]
    AuthRequired {
        adapter_id: String,
        credential: String,
    },

    /// The Checkmk API call failed.
    #[error("{message}{}", render_hint(.hint))]
    Api {
        message: String,
        endpoint: Option<String>,
        hint: Option<String>,
        status: Option<u16>,
    },

    /// Configuration error in adapter setup.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Catch-all for unexpected internal errors.
    #[error("internal adapter error: {0}")]
    Internal(String),
}

fn render_hint(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" (hint: {hint})"),
        None => String::new(),
    }
}

impl AdapterError {
    /// Shorthand for [`AdapterError::InvalidParams`].
    pub fn invalid(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// The upstream HTTP status, for API errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Api { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

const CONFLICT_HINT: &str =
    "the object was changed by someone else in the meantime; read it again and retry";
const TAG_HINT: &str = "verify that the object exists; folders are addressed as `~` paths \
                        (Checkmk uses ~ instead of / in folder IDs)";

impl From<ClientError> for AdapterError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Validation(reason) => Self::InvalidParams {
                operation: "request".into(),
                reason,
            },
            ClientError::Config(reason) => Self::ConfigError(reason),
            ClientError::NotFound {
                endpoint,
                identifier,
                hint,
            } => Self::Api {
                message: format!("object `{identifier}` was not found"),
                endpoint: Some(endpoint),
                hint: Some(hint),
                status: Some(404),
            },
            ClientError::Conflict { .. } => Self::Api {
                message: error.to_string(),
                endpoint: error.endpoint().map(str::to_string),
                hint: Some(CONFLICT_HINT.into()),
                status: Some(412),
            },
            ClientError::TagUnavailable { .. } => Self::Api {
                message: error.to_string(),
                endpoint: error.endpoint().map(str::to_string),
                hint: Some(TAG_HINT.into()),
                status: None,
            },
            other => Self::Api {
                message: other.to_string(),
                endpoint: other.endpoint().map(str::to_string),
                hint: None,
                status: other.status(),
            },
        }
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_keeps_identifier_and_hint() {
        let err = AdapterError::from(ClientError::NotFound {
            endpoint: "/objects/folder_config/linux".into(),
            identifier: "linux".into(),
            hint: "Checkmk uses ~ instead of / in folder IDs".into(),
        });
        assert_eq!(err.status(), Some(404));
        assert!(err.hint().unwrap().contains('~'));
        let text = err.to_string();
        assert!(text.contains("`linux`"));
        assert!(text.contains("(hint: "));
    }

    #[test]
    fn conflict_gets_retry_hint() {
        let err = AdapterError::from(ClientError::Conflict {
            endpoint: "/objects/host_config/srv1".into(),
            message: "ETag mismatch".into(),
        });
        assert_eq!(err.status(), Some(412));
        assert!(err.to_string().contains("ETag mismatch"));
        assert_eq!(err.hint(), Some(CONFLICT_HINT));
    }

    #[test]
    fn wire_errors_keep_endpoint_and_status() {
        let err = AdapterError::from(ClientError::Api {
            endpoint: "/version".into(),
            status: 401,
            message: "Unauthorized".into(),
        });
        match &err {
            AdapterError::Api {
                endpoint, status, hint, ..
            } => {
                assert_eq!(endpoint.as_deref(), Some("/version"));
                assert_eq!(*status, Some(401));
                assert!(hint.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("hint"));
    }

    #[test]
    fn config_errors_stay_config_errors() {
        let err = AdapterError::from(ClientError::Config("host is empty".into()));
        assert!(matches!(err, AdapterError::ConfigError(_)));
    }
}

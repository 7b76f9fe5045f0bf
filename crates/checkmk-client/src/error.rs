//! Client error types.
//!
//! Every failure inside the client surfaces as a [`ClientError`].  The
//! variants separate what went wrong on the wire (a non-success status, a
//! network failure, an unparseable body) from what the conditional mutation
//! protocol decided (missing tag, stale tag, missing object), so callers can
//! react without inspecting message strings.

/// Unified error type for the Checkmk REST API client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    // -- Wire errors --------------------------------------------------------
    /// The upstream API answered with a non-success status.
    #[error("Checkmk API returned {status} for `{endpoint}`: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset).
    #[error("request to `{endpoint}` failed: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The transport gave up waiting for a response.
    #[error("request to `{endpoint}` timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },

    /// The response body was not valid JSON.
    #[error("invalid response from `{endpoint}`: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    // -- Conditional mutation errors ----------------------------------------
    /// The object addressed by a mutation does not exist (its tag GET
    /// returned 404).
    #[error("object `{identifier}` not found at `{endpoint}`: {hint}")]
    NotFound {
        endpoint: String,
        identifier: String,
        hint: String,
    },

    /// Reading the entity tag failed for a reason other than 404.
    #[error("could not retrieve entity tag from `{endpoint}`: {source}")]
    TagFetch {
        endpoint: String,
        #[source]
        source: Box<ClientError>,
    },

    /// The object answered without an `ETag` header.
    #[error(
        "entity tag not supported for `{endpoint}`: the resource does not support \
         conditional updates or does not exist"
    )]
    TagUnavailable { endpoint: String },

    /// The server rejected the `If-Match` tag (412 Precondition Failed).
    #[error("precondition failed for `{endpoint}` (412): {message}")]
    Conflict { endpoint: String, message: String },

    // -- Local errors -------------------------------------------------------
    /// A locally checked field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Credentials or transport settings are unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for broken internal invariants.
    #[error("internal client error: {0}")]
    Internal(String),
}

impl ClientError {
    /// The upstream HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(412),
            Self::TagFetch { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the upstream reported the addressed object as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Api { status: 404, .. })
    }

    /// Whether the upstream rejected a stale `If-Match` tag.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Api { status: 412, .. })
    }

    /// The API endpoint involved in the failure, if known.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Api { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::InvalidResponse { endpoint, .. }
            | Self::NotFound { endpoint, .. }
            | Self::TagFetch { endpoint, .. }
            | Self::TagUnavailable { endpoint }
            | Self::Conflict { endpoint, .. } => Some(endpoint),
            _ => None,
        }
    }

    /// Re-label a 412 API error as a [`ClientError::Conflict`].  Any other
    /// error is returned unchanged.
    pub(crate) fn into_conflict(self) -> Self {
        match self {
            Self::Api {
                endpoint,
                status: 412,
                message,
            } => Self::Conflict { endpoint, message },
            other => other,
        }
    }
}

/// Convenience alias used throughout the client crate.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ClientError {
        ClientError::Api {
            endpoint: "/objects/host_config/srv1".into(),
            status,
            message: "boom".into(),
        }
    }

    #[test]
    fn status_is_reported_for_wire_and_protocol_errors() {
        assert_eq!(api(500).status(), Some(500));
        assert_eq!(api(412).into_conflict().status(), Some(412));
        assert_eq!(ClientError::Validation("x".into()).status(), None);

        let wrapped = ClientError::TagFetch {
            endpoint: "/objects/host_config/srv1".into(),
            source: Box::new(api(503)),
        };
        assert_eq!(wrapped.status(), Some(503));
    }

    #[test]
    fn conflict_classification() {
        assert!(api(412).is_conflict());
        assert!(!api(409).is_conflict());
        let conflict = api(412).into_conflict();
        assert!(matches!(conflict, ClientError::Conflict { .. }));
        assert!(conflict.to_string().contains("boom"));
    }

    #[test]
    fn into_conflict_leaves_other_errors_alone() {
        let err = api(500).into_conflict();
        assert!(matches!(err, ClientError::Api { status: 500, .. }));
    }

    #[test]
    fn not_found_classification() {
        assert!(api(404).is_not_found());
        assert!(!api(400).is_not_found());
    }

    #[test]
    fn endpoint_is_exposed() {
        assert_eq!(api(500).endpoint(), Some("/objects/host_config/srv1"));
        assert_eq!(ClientError::Config("bad".into()).endpoint(), None);
    }
}

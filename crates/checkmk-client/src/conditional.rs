//! Conditional mutations guarded by entity tags.
//!
//! Checkmk refuses PUT, DELETE and most action invocations on versioned
//! objects unless the caller proves it has seen the current version by
//! sending `If-Match: "<etag>"`.  The executor here reads the tag with a
//! GET immediately before mutating, and absorbs exactly one 412 by reading
//! a fresh tag and trying once more.
//!
//! The flow is an explicit state machine.  [`MutationState::transition`] is
//! a pure function from (state, outcome of the state's I/O) to the next
//! state; [`CheckmkClient::run_mutation`] performs the I/O each state asks
//! for and feeds the outcome back in.  The retry states carry the first
//! conflict with them, so a second conflict (or a failed re-read) ends in
//! [`MutationState::Failed`] holding the original error.
//!
//! ```text
//! FetchTag ──tag──▶ Mutate ──ok──▶ Done
//!    │               │
//!    │ 404/err/none  │ 412
//!    ▼               ▼
//!  Failed ◀── RetryFetchTag ──tag──▶ RetryMutate ──ok──▶ Done
//!             (any failure: original 412)   (412: original 412)
//! ```

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::Credentials;
use crate::error::{ClientError, Result};
use crate::etag::{EntityTag, Tagged};
use crate::folder::{is_folder_id, normalize_folder_id};
use crate::request::{CheckmkClient, RequestSpec};

const ACTIONS_SEGMENT: &str = "/actions/";
const FOLDER_OBJECTS: &str = "/objects/folder_config/";

const FOLDER_HINT: &str = "Checkmk uses ~ instead of / in folder IDs (`/` is `~`, \
                           `/foo/bar` is `~foo~bar`)";
const OBJECT_HINT: &str = "check that the object exists and that its identifier is \
                           spelled exactly as in Checkmk";

/// The endpoint an entity tag is read from.
///
/// Action sub-resources (`/objects/host_config/srv1/actions/move/invoke`)
/// carry no tag of their own; the tag belongs to the object in front of
/// `/actions/`.
pub fn tag_endpoint(path: &str) -> &str {
    match path.find(ACTIONS_SEGMENT) {
        Some(index) => &path[..index],
        None => path,
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// Where a conditional mutation stands.
#[derive(Debug)]
pub enum MutationState {
    /// Read the current tag of the target object.
    FetchTag,
    /// Send the mutation with `If-Match` set to `tag`.
    Mutate { tag: EntityTag },
    /// The first attempt hit a 412; read a fresh tag.
    RetryFetchTag { conflict: ClientError },
    /// Send the mutation once more with the fresh tag.
    RetryMutate {
        tag: EntityTag,
        conflict: ClientError,
    },
    /// The mutation succeeded.
    Done { body: Value },
    /// The mutation failed for good.
    Failed { error: ClientError },
}

/// The outcome of the I/O a state performed.
#[derive(Debug)]
pub enum MutationEvent {
    /// Result of the tag GET.
    TagRead(Result<Tagged>),
    /// Result of the mutating request.
    MutationSent(Result<Value>),
}

impl MutationState {
    /// Short name used in log events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchTag => "fetch_tag",
            Self::Mutate { .. } => "mutate",
            Self::RetryFetchTag { .. } => "retry_fetch_tag",
            Self::RetryMutate { .. } => "retry_mutate",
            Self::Done { .. } => "done",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Failed { .. })
    }

    /// Compute the next state.  Terminal states absorb every event.
    pub fn transition(self, event: MutationEvent, tag_endpoint: &str) -> Self {
        use MutationEvent::{MutationSent, TagRead};

        match (self, event) {
            (Self::FetchTag, TagRead(Ok(tagged))) => match tagged.entity_tag() {
                Some(tag) => Self::Mutate { tag },
                None => Self::Failed {
                    error: ClientError::TagUnavailable {
                        endpoint: tag_endpoint.to_string(),
                    },
                },
            },
            (Self::FetchTag, TagRead(Err(error))) => Self::Failed {
                error: tag_read_failure(error, tag_endpoint),
            },

            (Self::Mutate { .. } | Self::RetryMutate { .. }, MutationSent(Ok(body))) => {
                Self::Done { body }
            }
            (Self::Mutate { .. }, MutationSent(Err(error))) if error.is_conflict() => {
                Self::RetryFetchTag {
                    conflict: error.into_conflict(),
                }
            }
            (Self::Mutate { .. }, MutationSent(Err(error))) => Self::Failed { error },

            (Self::RetryFetchTag { conflict }, TagRead(Ok(tagged))) => match tagged.entity_tag() {
                Some(tag) => Self::RetryMutate { tag, conflict },
                None => Self::Failed { error: conflict },
            },
            (Self::RetryFetchTag { conflict }, TagRead(Err(_))) => Self::Failed { error: conflict },

            (Self::RetryMutate { conflict, .. }, MutationSent(Err(error))) if error.is_conflict() => {
                Self::Failed { error: conflict }
            }
            (Self::RetryMutate { .. }, MutationSent(Err(error))) => Self::Failed { error },

            (terminal @ (Self::Done { .. } | Self::Failed { .. }), _) => terminal,

            (state, event) => Self::Failed {
                error: ClientError::Internal(format!(
                    "unexpected {} in state {}",
                    event_name(&event),
                    state.name()
                )),
            },
        }
    }
}

fn event_name(event: &MutationEvent) -> &'static str {
    match event {
        MutationEvent::TagRead(_) => "tag read",
        MutationEvent::MutationSent(_) => "mutation result",
    }
}

/// Classify a failed tag GET.
fn tag_read_failure(error: ClientError, tag_endpoint: &str) -> ClientError {
    if error.is_not_found() {
        let hint = if tag_endpoint.contains(FOLDER_OBJECTS) {
            FOLDER_HINT
        } else {
            OBJECT_HINT
        };
        ClientError::NotFound {
            endpoint: tag_endpoint.to_string(),
            identifier: object_identifier(tag_endpoint),
            hint: hint.to_string(),
        }
    } else {
        ClientError::TagFetch {
            endpoint: tag_endpoint.to_string(),
            source: Box::new(error),
        }
    }
}

/// The decoded identifier of an object endpoint: everything after
/// `/objects/<domain>/`, or the last path segment otherwise.
fn object_identifier(endpoint: &str) -> String {
    let raw = endpoint
        .strip_prefix("/objects/")
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, id)| id)
        .unwrap_or_else(|| endpoint.rsplit('/').next().unwrap_or(endpoint));
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// A successful conditional mutation and what it took.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub body: Value,
    /// Number of tag GETs issued (1, or 2 after a conflict).
    pub tag_reads: u32,
    /// Number of mutating requests issued (1, or 2 after a conflict).
    pub attempts: u32,
}

impl CheckmkClient {
    /// Run a mutation under `If-Match`, reading the tag from the object the
    /// path addresses.
    pub async fn mutate(&self, credentials: &Credentials, spec: RequestSpec) -> Result<Value> {
        let endpoint = tag_endpoint(&spec.path).to_string();
        self.mutate_with_tag_from(credentials, spec, &endpoint).await
    }

    /// Run a mutation under `If-Match`, reading the tag from `tag_endpoint`.
    pub async fn mutate_with_tag_from(
        &self,
        credentials: &Credentials,
        spec: RequestSpec,
        tag_endpoint: &str,
    ) -> Result<Value> {
        self.run_mutation(credentials, spec, tag_endpoint)
            .await
            .map(|outcome| outcome.body)
    }

    /// Drive the conditional mutation state machine to completion.
    pub async fn run_mutation(
        &self,
        credentials: &Credentials,
        spec: RequestSpec,
        tag_endpoint: &str,
    ) -> Result<MutationOutcome> {
        let mut state = MutationState::FetchTag;
        let mut tag_reads = 0;
        let mut attempts = 0;

        while !state.is_terminal() {
            let event = match &state {
                MutationState::FetchTag | MutationState::RetryFetchTag { .. } => {
                    tag_reads += 1;
                    MutationEvent::TagRead(
                        self.read_with_tag(credentials, RequestSpec::get(tag_endpoint))
                            .await,
                    )
                }
                MutationState::Mutate { tag } | MutationState::RetryMutate { tag, .. } => {
                    attempts += 1;
                    let request = spec.clone().with_header("If-Match", tag.if_match());
                    MutationEvent::MutationSent(self.request(credentials, request).await)
                }
                MutationState::Done { .. } | MutationState::Failed { .. } => break,
            };

            let from = state.name();
            state = state.transition(event, tag_endpoint);
            debug!(
                method = %spec.method,
                path = %spec.path,
                from = from,
                to = state.name(),
                "conditional mutation transition"
            );
            if let MutationState::RetryFetchTag { conflict } = &state {
                warn!(path = %spec.path, error = %conflict, "entity tag was stale, retrying once with a fresh tag");
            }
        }

        match state {
            MutationState::Done { body } => {
                info!(method = %spec.method, path = %spec.path, attempts = attempts, "conditional mutation applied");
                Ok(MutationOutcome {
                    body,
                    tag_reads,
                    attempts,
                })
            }
            MutationState::Failed { error } => Err(self.enrich_not_found(credentials, error).await),
            other => Err(ClientError::Internal(format!(
                "conditional mutation stopped in state {}",
                other.name()
            ))),
        }
    }

    /// Improve the hint of a folder lookup that used `/` separators by
    /// probing the `~` form once.  Probe failures are swallowed; the
    /// original not-found error is returned either way.
    async fn enrich_not_found(&self, credentials: &Credentials, error: ClientError) -> ClientError {
        let (endpoint, identifier, hint) = match error {
            ClientError::NotFound {
                endpoint,
                identifier,
                hint,
            } => (endpoint, identifier, hint),
            other => return other,
        };

        if !endpoint.contains(FOLDER_OBJECTS) || is_folder_id(&identifier) {
            return ClientError::NotFound {
                endpoint,
                identifier,
                hint,
            };
        }

        let normalized = normalize_folder_id(&identifier);
        let probe = format!("{FOLDER_OBJECTS}{}", urlencoding::encode(&normalized));
        let hint = match self.request(credentials, RequestSpec::get(&probe)).await {
            Ok(_) => format!(
                "the folder exists as `{normalized}`; Checkmk uses ~ instead of / in folder IDs"
            ),
            Err(probe_error) => {
                debug!(probe = %probe, error = %probe_error, "folder id probe failed");
                hint
            }
        };

        ClientError::NotFound {
            endpoint,
            identifier,
            hint,
        }
    }
}

//! The resource dispatcher.
//!
//! Maps a (resource, operation, parameters) triple onto exactly one call
//! of the client: a plain request, a conditional mutation or a collection
//! walk.
//!
//! - [`resource`]: the catalogue of resources and operations.
//! - [`operation`]: the typed, validated request for one input item.
//! - [`plan`]: the call a typed request turns into, and its execution.

pub mod operation;
pub mod plan;
pub mod resource;

use checkmk_client::{CheckmkClient, Credentials};
use serde_json::Value;

pub use operation::{DEFAULT_LIMIT, ListMode, ResourceOperation};
pub use plan::{CallKind, CallPlan, query_expression};
pub use resource::{Operation, Resource};

use crate::error::Result;
use crate::params::ItemParams;

/// Validate, plan and execute one item.  Returns the output records.
pub async fn dispatch(
    client: &CheckmkClient,
    credentials: &Credentials,
    resource: Resource,
    operation: Operation,
    params: &ItemParams<'_>,
) -> Result<Vec<Value>> {
    let typed = ResourceOperation::parse(resource, operation, params)?;
    typed.plan().execute(client, credentials).await
}

//! Checkmk adapter for workflow hosts.
//!
//! The [`CheckmkAdapter`] implements the [`Adapter`] trait defined in
//! [`traits`], exposing one tool per Checkmk resource.  Each invocation is
//! validated into a typed [`ResourceOperation`], planned into exactly one
//! client call and executed per input item by [`run_batch`].

pub mod batch;
pub mod checkmk;
pub mod dispatcher;
pub mod error;
pub mod params;
pub mod traits;

pub use batch::{BatchItem, run_batch};
pub use checkmk::CheckmkAdapter;
pub use dispatcher::{CallKind, CallPlan, ListMode, Operation, Resource, ResourceOperation, dispatch};
pub use error::{AdapterError, Result};
pub use params::{ItemParams, JsonItems, ParameterSource};
pub use traits::{Adapter, AuthRequirement, HealthStatus, ToolDefinition};

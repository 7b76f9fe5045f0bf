//! Per-item execution over a batch of input items.

use checkmk_client::{CheckmkClient, Credentials};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::dispatcher::{Resource, dispatch};
use crate::error::Result;
use crate::params::{ItemParams, ParameterSource};

/// One output record, paired with the input item it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub item_index: usize,
    pub json: Value,
}

/// Run `resource`/`operation` for every item of `source`, in order.
///
/// Listing operations contribute one record per element.  An unknown
/// resource or operation fails the whole batch up front.  A failing item
/// aborts the batch, unless `continue_on_fail` is set, in which case the
/// item's slot holds `{"error": <message>}` and the batch goes on.
pub async fn run_batch(
    client: &CheckmkClient,
    credentials: &Credentials,
    resource: &str,
    operation: &str,
    source: &dyn ParameterSource,
    continue_on_fail: bool,
) -> Result<Vec<BatchItem>> {
    let resource: Resource = resource.parse()?;
    let operation = resource.operation(operation)?;
    let label = format!("{resource}.{operation}");

    let mut output = Vec::new();
    let mut failed = 0usize;
    for item_index in 0..source.item_count() {
        let params = ItemParams::new(source, item_index, label.clone());
        match dispatch(client, credentials, resource, operation, &params).await {
            Ok(records) => output.extend(
                records
                    .into_iter()
                    .map(|json| BatchItem { item_index, json }),
            ),
            Err(error) if continue_on_fail => {
                warn!(
                    operation = %label,
                    item = item_index,
                    error = %error,
                    "item failed, continuing"
                );
                failed += 1;
                output.push(BatchItem {
                    item_index,
                    json: json!({ "error": error.to_string() }),
                });
            }
            Err(error) => return Err(error),
        }
    }

    info!(
        operation = %label,
        items = source.item_count(),
        records = output.len(),
        failed = failed,
        "batch completed"
    );
    Ok(output)
}

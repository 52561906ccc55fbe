//! Validation rule keeping filters out of data dependencies.

use crate::graph::Catalog;
use crate::store::{NodeId, Quantity, Scope};
use crate::validation::CompileError;

/// A filter narrows the record set; whatever flag it declares is not data.
/// Rejects `consumer` reading `quantity` when its producer is a filter.
pub(crate) fn check_not_filter(
    catalog: &Catalog,
    consumer: &str,
    quantity: &Quantity,
    producer: NodeId,
    scope: &Scope,
) -> Result<(), CompileError> {
    let node = &catalog[producer];
    if !node.is_filter() {
        return Ok(());
    }
    Err(CompileError::FilterAsInput {
        node: consumer.to_string(),
        quantity: quantity.clone(),
        filter: node.name().to_string(),
        scope: scope.clone(),
    })
}

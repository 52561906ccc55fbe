//! Validation rule for explicitly requested nodes.

use crate::graph::Catalog;
use crate::store::{NodeId, Scope};
use crate::validation::CompileError;

/// A node named in the request list must support the scope it is requested for.
///
/// Nodes reached only through a group are exempt: the builder skips them
/// silently when they are inactive. Children need no id check since
/// `Catalog::declare` only accepts already declared ones.
pub(crate) fn check_requested(catalog: &Catalog, id: NodeId, scope: &Scope) -> Result<(), CompileError> {
    let node = catalog.get(id).ok_or_else(|| CompileError::UnknownNode { node: id, scope: scope.clone() })?;
    if node.is_active(scope) {
        return Ok(());
    }
    Err(CompileError::ScopeMismatch {
        node: node.name().to_string(),
        scope: scope.clone(),
        supported: node.scopes().cloned().collect(),
    })
}

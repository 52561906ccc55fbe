use super::types::{NodeId, Quantity, Scope};
use crate::validation::CompileError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Quantities already present in every record before any producer runs
/// (supplied by the upstream data-format description).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalInputs {
    names: IndexSet<Quantity>,
}

impl ExternalInputs {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, quantity: impl Into<Quantity>) -> bool {
        self.names.insert(quantity.into())
    }

    pub fn contains(&self, quantity: &Quantity) -> bool { self.names.contains(quantity) }
    pub fn len(&self) -> usize { self.names.len() }
    pub fn is_empty(&self) -> bool { self.names.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &Quantity> { self.names.iter() }
}

impl<Q: Into<Quantity>> FromIterator<Q> for ExternalInputs {
    fn from_iter<I: IntoIterator<Item = Q>>(iter: I) -> Self {
        Self { names: iter.into_iter().map(Into::into).collect() }
    }
}

impl<Q: Into<Quantity>> Extend<Q> for ExternalInputs {
    fn extend<I: IntoIterator<Item = Q>>(&mut self, iter: I) {
        self.names.extend(iter.into_iter().map(Into::into));
    }
}

/// Where a consumed quantity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Present in the input record; no producer edge.
    External,
    /// Created by the given declaration.
    Produced(NodeId),
    /// Created by the given declaration in the shared scope, which runs
    /// before this one. No producer edge, but the producer is still known.
    Upstream(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProducerEntry {
    node: NodeId,
    name: String,
}

/// Quantities produced by the shared scope, keyed to their producers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedOutputs {
    producers: IndexMap<Quantity, ProducerEntry>,
}

impl SharedOutputs {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, quantity: impl Into<Quantity>, node: NodeId, node_name: impl Into<String>) {
        self.producers.insert(quantity.into(), ProducerEntry { node, name: node_name.into() });
    }

    pub fn contains(&self, quantity: &Quantity) -> bool { self.producers.contains_key(quantity) }
    pub fn len(&self) -> usize { self.producers.len() }
    pub fn is_empty(&self) -> bool { self.producers.is_empty() }
}

/// Catalogue of named quantities, partitioned by scope.
///
/// A quantity produced in one scope is invisible from every other scope, so the
/// same name may be produced by different logic per channel while two producers
/// of one name inside a single scope are rejected.
#[derive(Debug, Clone, Default)]
pub struct QuantityRegistry {
    externals: ExternalInputs,
    shared: SharedOutputs,
    produced: HashMap<Scope, HashMap<Quantity, ProducerEntry>>,
}

impl QuantityRegistry {
    pub fn new(externals: ExternalInputs) -> Self {
        Self::with_shared(externals, SharedOutputs::default())
    }

    /// A registry for a scope compiled after the shared scope.
    pub fn with_shared(externals: ExternalInputs, shared: SharedOutputs) -> Self {
        Self { externals, shared, produced: HashMap::new() }
    }

    pub fn externals(&self) -> &ExternalInputs { &self.externals }

    /// Records `node` as the producer of `quantity` in `scope`.
    pub fn declare_output(
        &mut self,
        quantity: &Quantity,
        node: NodeId,
        node_name: &str,
        scope: &Scope,
    ) -> Result<(), CompileError> {
        if self.externals.contains(quantity) {
            return Err(CompileError::DuplicateProduction {
                quantity: quantity.clone(),
                scope: scope.clone(),
                first: "external input".to_string(),
                second: node_name.to_string(),
            });
        }
        if let Some(upstream) = self.shared.producers.get(quantity) {
            return Err(CompileError::DuplicateProduction {
                quantity: quantity.clone(),
                scope: scope.clone(),
                first: upstream.name.clone(),
                second: node_name.to_string(),
            });
        }

        let table = self.produced.entry(scope.clone()).or_default();
        if let Some(existing) = table.get(quantity) {
            // Re-declaring from the same node is a no-op (shared subproducers).
            if existing.node == node {
                return Ok(());
            }
            return Err(CompileError::DuplicateProduction {
                quantity: quantity.clone(),
                scope: scope.clone(),
                first: existing.name.clone(),
                second: node_name.to_string(),
            });
        }
        table.insert(quantity.clone(), ProducerEntry { node, name: node_name.to_string() });
        Ok(())
    }

    pub fn resolve(&self, quantity: &Quantity, scope: &Scope) -> Result<Origin, CompileError> {
        if let Some(entry) = self.produced.get(scope).and_then(|t| t.get(quantity)) {
            return Ok(Origin::Produced(entry.node));
        }
        if let Some(upstream) = self.shared.producers.get(quantity) {
            return Ok(Origin::Upstream(upstream.node));
        }
        if self.externals.contains(quantity) {
            return Ok(Origin::External);
        }
        Err(CompileError::UnknownQuantity { quantity: quantity.clone(), scope: scope.clone() })
    }

    pub fn producer_name(&self, quantity: &Quantity, scope: &Scope) -> Option<&str> {
        self.produced
            .get(scope)
            .and_then(|t| t.get(quantity))
            .or_else(|| self.shared.producers.get(quantity))
            .map(|e| e.name.as_str())
    }

    pub fn produced_count(&self, scope: &Scope) -> usize {
        self.produced.get(scope).map_or(0, |t| t.len())
    }
}

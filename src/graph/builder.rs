//! Expands requested declarations for one scope into a `DependencyGraph`.
//!
//! Two passes: expansion walks the request (children before their group),
//! creating one scheduled node per (declaration, scope) and registering every
//! output; linking then resolves each consumed quantity against the registry
//! and draws producer -> consumer edges. Because outputs are all known before
//! linking, request order never affects which dependencies resolve.

use super::catalog::Catalog;
use super::dag::{Dependency, DependencyGraph, ScopedNode};
use super::node::{Node, NodeKind};
use crate::store::{ExternalInputs, NodeId, Origin, Quantity, QuantityRegistry, Scope};
use crate::validation::{rules, CompileError};
use petgraph::graph::NodeIndex;
use smallvec::{smallvec, SmallVec};
use std::collections::{HashMap, HashSet};
use tracing::debug;

type Members = SmallVec<[NodeIndex; 8]>;

#[derive(Debug, Clone)]
enum Expansion {
    /// Not active in this scope; pulled in transitively and skipped.
    Inactive,
    Scheduled(NodeIndex),
    /// A call-less group: stands for its scheduled descendants.
    Aggregate(Members),
}

impl Expansion {
    fn members(&self) -> Members {
        match self {
            Expansion::Inactive => SmallVec::new(),
            Expansion::Scheduled(idx) => smallvec![*idx],
            Expansion::Aggregate(members) => members.clone(),
        }
    }
}

/// Name of the output generated for a child whose result is combined by its
/// parent's call (a cut contributing one mask to a combined selection).
pub fn combined_output(child: &Node) -> Quantity {
    Quantity(format!("{}_output", child.name()))
}

pub struct GraphBuilder<'a> {
    catalog: &'a Catalog,
    scope: Scope,
    registry: QuantityRegistry,
    graph: DependencyGraph,
    expanded: HashMap<NodeId, Expansion>,
    combined_children: HashSet<NodeId>,
    reexports: Vec<(NodeId, Quantity)>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(catalog: &'a Catalog, scope: Scope, externals: ExternalInputs) -> Self {
        Self::with_registry(catalog, scope, QuantityRegistry::new(externals))
    }

    /// Builds against a pre-seeded registry, e.g. one carrying the shared scope's outputs.
    pub fn with_registry(catalog: &'a Catalog, scope: Scope, registry: QuantityRegistry) -> Self {
        Self {
            catalog,
            graph: DependencyGraph::new(scope.clone()),
            scope,
            registry,
            expanded: HashMap::new(),
            combined_children: HashSet::new(),
            reexports: Vec::new(),
        }
    }

    /// Builds the graph for `request`.
    pub fn build(mut self, request: &[NodeId]) -> Result<DependencyGraph, CompileError> {
        for &id in request {
            rules::scope::check_requested(self.catalog, id, &self.scope)?;
        }

        let mut visited = HashSet::new();
        for &id in request {
            self.mark_combined(id, &mut visited);
        }
        for &id in request {
            self.expand(id)?;
        }
        self.link()?;
        self.check_reexports()?;

        debug!(
            scope = %self.scope,
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            produced = self.registry.produced_count(&self.scope),
            "dependency graph built"
        );
        Ok(self.graph)
    }

    /// Finds children whose empty output list is filled by a generated mask
    /// because their parent's call combines them.
    fn mark_combined(&mut self, id: NodeId, visited: &mut HashSet<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        let catalog = self.catalog;
        let node = &catalog[id];
        if !node.is_active(&self.scope) {
            return;
        }
        let combines = node.call().is_some();
        for &child in node.children() {
            let child_node = &catalog[child];
            if combines
                && child_node.is_active(&self.scope)
                && child_node.kind() != NodeKind::Filter
                && child_node.call().is_some()
                && child_node.declared_outputs().is_empty()
            {
                self.combined_children.insert(child);
            }
            self.mark_combined(child, visited);
        }
    }

    fn expand(&mut self, id: NodeId) -> Result<Members, CompileError> {
        if let Some(done) = self.expanded.get(&id) {
            return Ok(done.members());
        }
        let catalog = self.catalog;
        let node = &catalog[id];
        if !node.is_active(&self.scope) {
            debug!(scope = %self.scope, node = node.name(), "skipping subproducer inactive in scope");
            self.expanded.insert(id, Expansion::Inactive);
            return Ok(SmallVec::new());
        }

        let mut members = Members::new();
        let mut generated: SmallVec<[Quantity; 4]> = SmallVec::new();
        for &child in node.children() {
            let child_members = self.expand(child)?;
            if node.call().is_some() && self.combined_children.contains(&child) && catalog[child].is_active(&self.scope) {
                let output = combined_output(&catalog[child]);
                // A child listed twice still contributes one mask.
                if !generated.contains(&output) {
                    generated.push(output);
                }
            }
            members.extend(child_members);
        }

        let Some(template) = node.call() else {
            for quantity in node.declared_outputs() {
                self.reexports.push((id, quantity.clone()));
            }
            self.expanded.insert(id, Expansion::Aggregate(members.clone()));
            return Ok(members);
        };

        let mut outputs: SmallVec<[Quantity; 2]> = node.declared_outputs().iter().cloned().collect();
        if outputs.is_empty() && self.combined_children.contains(&id) {
            outputs.push(combined_output(node));
        }
        let mut inputs: SmallVec<[Quantity; 4]> = node.inputs_for(&self.scope).iter().cloned().collect();
        inputs.extend(generated);

        for quantity in &outputs {
            self.registry.declare_output(quantity, id, node.name(), &self.scope)?;
        }

        let idx = self.graph.add_node(ScopedNode {
            node: id,
            name: node.name().to_string(),
            kind: node.kind(),
            template: template.to_string(),
            inputs,
            outputs,
        });
        for member in members {
            self.graph.add_dependency(member, idx, Dependency::Member);
        }
        self.expanded.insert(id, Expansion::Scheduled(idx));
        Ok(smallvec![idx])
    }

    fn link(&mut self) -> Result<(), CompileError> {
        let indices: Vec<NodeIndex> = self.graph.indices().collect();
        for idx in indices {
            let (inputs, consumer) = {
                let n = self.graph.node(idx);
                (n.inputs.clone(), n.name.clone())
            };
            for quantity in &inputs {
                match self.registry.resolve(quantity, &self.scope) {
                    Ok(Origin::External) => self.graph.mark_external(quantity),
                    Ok(Origin::Upstream(producer)) => {
                        rules::filters::check_not_filter(self.catalog, &consumer, quantity, producer, &self.scope)?;
                        self.graph.mark_external(quantity);
                    }
                    Ok(Origin::Produced(producer)) => {
                        rules::filters::check_not_filter(self.catalog, &consumer, quantity, producer, &self.scope)?;
                        if let Some(from) = self.graph.index_of(producer) {
                            self.graph.add_dependency(from, idx, Dependency::Data(quantity.clone()));
                        }
                    }
                    // The registry only knows the quantity; the consumer is what a user can fix.
                    Err(_) => {
                        return Err(CompileError::MissingDependency {
                            node: consumer,
                            quantity: quantity.clone(),
                            scope: self.scope.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// A call-less group's declared outputs must be produced by something in scope.
    fn check_reexports(&self) -> Result<(), CompileError> {
        for (group, quantity) in &self.reexports {
            if !matches!(self.registry.resolve(quantity, &self.scope), Ok(Origin::Produced(_))) {
                return Err(CompileError::MissingDependency {
                    node: self.catalog[*group].name().to_string(),
                    quantity: quantity.clone(),
                    scope: self.scope.clone(),
                });
            }
        }
        Ok(())
    }
}

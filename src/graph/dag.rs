//! dag.rs
//! Scope-specialised dependency graph. Nodes are the (declaration, scope)
//! pairs that emit a call; edges run from producer to consumer.

use super::node::NodeKind;
use crate::store::{NodeId, Quantity, Scope};
use indexmap::IndexSet;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Why one scheduled node must run before another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// The consumer reads a quantity the producer writes.
    Data(Quantity),
    /// A child runs before the group or filter whose call combines it.
    Member,
}

/// A declaration specialised for one scope: inputs are the scope's concrete
/// list, outputs include any generated mask outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedNode {
    pub node: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub template: String,
    pub inputs: SmallVec<[Quantity; 4]>,
    pub outputs: SmallVec<[Quantity; 2]>,
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<ScopedNode, Dependency>,
    scope: Scope,
    slots: HashMap<NodeId, NodeIndex>,
    external_roots: IndexSet<Quantity>,
}

impl DependencyGraph {
    pub fn new(scope: Scope) -> Self {
        Self {
            graph: DiGraph::new(),
            scope,
            slots: HashMap::new(),
            external_roots: IndexSet::new(),
        }
    }

    pub fn scope(&self) -> &Scope { &self.scope }
    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }

    pub(crate) fn add_node(&mut self, node: ScopedNode) -> NodeIndex {
        let id = node.node;
        let idx = self.graph.add_node(node);
        self.slots.insert(id, idx);
        idx
    }

    pub(crate) fn add_dependency(&mut self, from: NodeIndex, to: NodeIndex, dep: Dependency) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, dep);
        }
    }

    pub(crate) fn mark_external(&mut self, quantity: &Quantity) {
        if !self.external_roots.contains(quantity) {
            self.external_roots.insert(quantity.clone());
        }
    }

    pub fn index_of(&self, node: NodeId) -> Option<NodeIndex> { self.slots.get(&node).copied() }

    pub fn node(&self, idx: NodeIndex) -> &ScopedNode { &self.graph[idx] }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ { self.graph.node_indices() }

    /// External quantities consumed somewhere in this graph, in first-use order.
    pub fn external_roots(&self) -> impl Iterator<Item = &Quantity> { self.external_roots.iter() }

    pub fn producers_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    pub fn consumers_of(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }
}

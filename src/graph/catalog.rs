//! The arena of declarations and the per-scope request lists handed to the builder.

use super::node::{Inputs, Node, NodeKind, NodeSpec};
use crate::store::{NodeId, Quantity, Scope};
use crate::validation::DeclarationError;
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::Index;

/// Owns every declaration. Nodes are immutable once declared and are
/// referenced by `NodeId` from groups, requests and compiled calls.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    nodes: Vec<Node>,
    // Names may repeat across disjoint scope sets.
    by_name: HashMap<String, SmallVec<[NodeId; 2]>>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn get(&self, id: NodeId) -> Option<&Node> { self.nodes.get(id.index()) }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId::new(i), n))
    }

    /// Validates the declaration and appends it. Children must already be declared.
    pub fn declare(&mut self, decl: NodeSpec) -> Result<NodeId, DeclarationError> {
        let NodeSpec { name, kind, scopes: scope_list, inputs, outputs, call, children } = decl;

        if scope_list.is_empty() {
            return Err(DeclarationError::EmptyScopes(name));
        }
        let mut scopes = IndexSet::with_capacity(scope_list.len());
        for scope in scope_list {
            if scopes.contains(&scope) {
                return Err(DeclarationError::RepeatedScope { node: name, scope });
            }
            scopes.insert(scope);
        }

        for &other in self.by_name.get(&name).into_iter().flatten() {
            if let Some(shared) = self.nodes[other.index()].scopes.iter().find(|s| scopes.contains(*s)) {
                return Err(DeclarationError::DuplicateName { name, scope: shared.clone() });
            }
        }

        if let Some(Inputs::PerScope(map)) = &inputs {
            if let Some(stray) = map.keys().find(|s| !scopes.contains(*s)) {
                return Err(DeclarationError::UnknownScopeOverride { node: name, scope: stray.clone() });
            }
            if let Some(missing) = scopes.iter().find(|s| !map.contains_key(*s)) {
                return Err(DeclarationError::MissingScopeInputs { node: name, scope: missing.clone() });
            }
        }

        match kind {
            NodeKind::Producer if !children.is_empty() => {
                return Err(DeclarationError::UnexpectedSubproducers(name));
            }
            NodeKind::ProducerGroup if children.is_empty() => {
                return Err(DeclarationError::EmptyGroup { node: name, kind: kind.label() });
            }
            NodeKind::Producer | NodeKind::Filter if call.is_none() => {
                return Err(DeclarationError::MissingCall { node: name, kind: kind.label() });
            }
            _ => {}
        }

        if let Some(child) = children.iter().find(|c| c.index() >= self.nodes.len()) {
            return Err(DeclarationError::UnknownChild { node: name, child: format!("#{}", child.0) });
        }

        let id = NodeId::new(self.nodes.len());
        self.by_name.entry(name.clone()).or_default().push(id);
        self.nodes.push(Node { name, kind, scopes, inputs, outputs, call, children });
        Ok(id)
    }

    /// Every declaration carrying `name`, in declaration order.
    pub fn find_all(&self, name: &str) -> &[NodeId] {
        self.by_name.get(name).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    /// The declaration called `name` that is active in `scope`.
    pub fn find(&self, name: &str, scope: &Scope) -> Option<NodeId> {
        self.find_all(name).iter().copied().find(|id| self[*id].is_active(scope))
    }

    /// Inputs a node exposes in `scope`: its declared list, or for a group
    /// that declares none, the union of its active children's.
    pub fn effective_inputs(&self, id: NodeId, scope: &Scope) -> Vec<Quantity> {
        let node = &self[id];
        if node.declares_inputs() || node.children.is_empty() {
            return node.inputs_for(scope).to_vec();
        }
        let mut union = IndexSet::new();
        for &child in node.children.iter().filter(|c| self[**c].is_active(scope)) {
            union.extend(self.effective_inputs(child, scope));
        }
        union.into_iter().collect()
    }

    /// Outputs a node exposes in `scope`, with the same fallback as `effective_inputs`.
    pub fn effective_outputs(&self, id: NodeId, scope: &Scope) -> Vec<Quantity> {
        let node = &self[id];
        if node.declares_outputs() || node.children.is_empty() {
            return node.declared_outputs().to_vec();
        }
        let mut union = IndexSet::new();
        for &child in node.children.iter().filter(|c| self[**c].is_active(scope)) {
            union.extend(self.effective_outputs(child, scope));
        }
        union.into_iter().collect()
    }
}

impl Index<NodeId> for Catalog {
    type Output = Node;
    fn index(&self, id: NodeId) -> &Node { &self.nodes[id.index()] }
}

/// Ordered top-level requests: which declarations to compile for each scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildPlan {
    requests: IndexMap<Scope, Vec<NodeId>>,
}

impl BuildPlan {
    pub fn new() -> Self { Self::default() }

    pub fn request(&mut self, scope: impl Into<Scope>, nodes: impl IntoIterator<Item = NodeId>) -> &mut Self {
        self.requests.entry(scope.into()).or_default().extend(nodes);
        self
    }

    pub fn get(&self, scope: &Scope) -> Option<&[NodeId]> {
        self.requests.get(scope).map(|v| v.as_slice())
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> { self.requests.keys() }

    pub fn iter(&self) -> impl Iterator<Item = (&Scope, &[NodeId])> {
        self.requests.iter().map(|(s, v)| (s, v.as_slice()))
    }

    pub fn len(&self) -> usize { self.requests.len() }
    pub fn is_empty(&self) -> bool { self.requests.is_empty() }
}

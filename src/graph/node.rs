//! Defines the `Node` declaration and its associated types, representing a single
//! computational step, an aggregation of steps, or an event filter.

use crate::store::{NodeId, Quantity, Scope};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// The three declaration flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A single computation step adding quantities to the record.
    Producer,
    /// An ordered aggregation of child nodes, optionally combined by its own call.
    ProducerGroup,
    /// Narrows the live record set instead of adding quantities.
    Filter,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Producer => "Producer",
            NodeKind::ProducerGroup => "ProducerGroup",
            NodeKind::Filter => "Filter",
        }
    }
}

/// Input list of a node: either shared by every scope, or chosen per scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Inputs {
    Flat(Vec<Quantity>),
    PerScope(IndexMap<Scope, Vec<Quantity>>),
}

impl Default for Inputs {
    fn default() -> Self { Inputs::Flat(Vec::new()) }
}

impl Inputs {
    /// The concrete list for `scope`. `Catalog::declare` rejects per-scope maps
    /// that miss one of the node's scopes, so the empty fallback only serves
    /// scopes the node is not active in.
    pub fn for_scope(&self, scope: &Scope) -> &[Quantity] {
        match self {
            Inputs::Flat(list) => list,
            Inputs::PerScope(map) => map.get(scope).map(|l| l.as_slice()).unwrap_or(&[]),
        }
    }
}

/// An immutable declaration. Holds no per-run state; the same node is shared by
/// every scope it is active in and specialised per scope by the graph builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) scopes: IndexSet<Scope>,
    /// `None` means "not declared": a group then exposes its children's inputs.
    pub(crate) inputs: Option<Inputs>,
    pub(crate) outputs: Option<Vec<Quantity>>,
    pub(crate) call: Option<String>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> NodeKind { self.kind }
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> { self.scopes.iter() }
    pub fn call(&self) -> Option<&str> { self.call.as_deref() }
    pub fn children(&self) -> &[NodeId] { &self.children }

    pub fn is_active(&self, scope: &Scope) -> bool { self.scopes.contains(scope) }
    pub fn is_filter(&self) -> bool { self.kind == NodeKind::Filter }

    /// Declared inputs resolved for `scope`.
    pub fn inputs_for(&self, scope: &Scope) -> &[Quantity] {
        self.inputs.as_ref().map(|i| i.for_scope(scope)).unwrap_or(&[])
    }

    pub fn declared_outputs(&self) -> &[Quantity] {
        self.outputs.as_deref().unwrap_or(&[])
    }

    pub(crate) fn declares_inputs(&self) -> bool { self.inputs.is_some() }
    pub(crate) fn declares_outputs(&self) -> bool { self.outputs.is_some() }
}

/// Builder for a declaration, consumed by `Catalog::declare`.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) scopes: Vec<Scope>,
    pub(crate) inputs: Option<Inputs>,
    pub(crate) outputs: Option<Vec<Quantity>>,
    pub(crate) call: Option<String>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeSpec {
    fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            scopes: Vec::new(),
            inputs: None,
            outputs: None,
            call: None,
            children: Vec::new(),
        }
    }

    pub fn producer(name: impl Into<String>) -> Self { Self::new(name, NodeKind::Producer) }
    pub fn group(name: impl Into<String>) -> Self { Self::new(name, NodeKind::ProducerGroup) }
    pub fn filter(name: impl Into<String>) -> Self { Self::new(name, NodeKind::Filter) }

    pub fn call(mut self, template: impl Into<String>) -> Self {
        self.call = Some(template.into());
        self
    }

    pub fn inputs<I, Q>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<Quantity>,
    {
        self.inputs = Some(Inputs::Flat(inputs.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds a scope-specific input list, switching the node to per-scope inputs.
    pub fn scoped_inputs<S, I, Q>(mut self, scope: S, inputs: I) -> Self
    where
        S: Into<Scope>,
        I: IntoIterator<Item = Q>,
        Q: Into<Quantity>,
    {
        if !matches!(self.inputs, Some(Inputs::PerScope(_))) {
            self.inputs = Some(Inputs::PerScope(IndexMap::new()));
        }
        if let Some(Inputs::PerScope(map)) = &mut self.inputs {
            map.insert(scope.into(), inputs.into_iter().map(Into::into).collect());
        }
        self
    }

    pub fn with_inputs(mut self, inputs: Inputs) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn outputs<I, Q>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = Q>,
        Q: Into<Quantity>,
    {
        self.outputs = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scope>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn subproducers(mut self, children: impl IntoIterator<Item = NodeId>) -> Self {
        self.children = children.into_iter().collect();
        self
    }
}

//! Defines the error types raised while declaring and compiling nodes.
use crate::codegen::template::TemplateError;
use crate::store::{NodeId, Quantity, Scope};
use std::fmt::Display;
use thiserror::Error;

fn join<T: Display>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

/// The specific category of a compile error.
///
// Mirrors `CompileError` without payloads so callers can branch on the failure
// without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    UnknownNode,
    UnknownQuantity,
    MissingDependency,
    DuplicateProduction,
    ScopeMismatch,
    CyclicDependency,
    UnboundPlaceholder,
    FilterAsInput,
    UpstreamScope,
}

/// A fatal build-time failure. Aborts compilation of the scope it was raised in.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Requested node #{} is not declared in the catalog (scope '{scope}')", .node.0)]
    UnknownNode { node: NodeId, scope: Scope },

    /// Raised by `QuantityRegistry::resolve`. The graph builder reports an
    /// unresolved input as `MissingDependency` instead, naming the consumer,
    /// so a compilation never surfaces this variant.
    #[error("Quantity '{quantity}' is neither produced nor an external input in scope '{scope}'")]
    UnknownQuantity { quantity: Quantity, scope: Scope },

    #[error("Node '{node}' consumes '{quantity}', which nothing produces in scope '{scope}'")]
    MissingDependency { node: String, quantity: Quantity, scope: Scope },

    #[error("Quantity '{quantity}' is produced twice in scope '{scope}': by '{first}' and by '{second}'")]
    DuplicateProduction { quantity: Quantity, scope: Scope, first: String, second: String },

    #[error("Node '{node}' was requested for scope '{scope}' but only supports [{}]", join(.supported))]
    ScopeMismatch { node: String, scope: Scope, supported: Vec<Scope> },

    #[error("Dependency cycle in scope '{scope}': {}", .cycle.join(" -> "))]
    CyclicDependency { scope: Scope, cycle: Vec<String> },

    #[error("Placeholder '{{{placeholder}}}' of node '{node}' has no binding in scope '{scope}'")]
    UnboundPlaceholder { node: String, placeholder: String, scope: Scope },

    #[error("Call template of node '{node}' is malformed ({reason}): {template}")]
    MalformedTemplate { node: String, template: String, reason: TemplateError },

    #[error("Node '{node}' consumes '{quantity}', the output of filter '{filter}' (scope '{scope}')")]
    FilterAsInput { node: String, quantity: Quantity, filter: String, scope: Scope },

    #[error("Scope '{scope}' depends on scope '{upstream}', which failed to compile")]
    UpstreamScope { scope: Scope, upstream: Scope },
}

impl CompileError {
    pub fn kind(&self) -> CompileErrorKind {
        match self {
            CompileError::UnknownNode { .. } => CompileErrorKind::UnknownNode,
            CompileError::UnknownQuantity { .. } => CompileErrorKind::UnknownQuantity,
            CompileError::MissingDependency { .. } => CompileErrorKind::MissingDependency,
            CompileError::DuplicateProduction { .. } => CompileErrorKind::DuplicateProduction,
            CompileError::ScopeMismatch { .. } => CompileErrorKind::ScopeMismatch,
            CompileError::CyclicDependency { .. } => CompileErrorKind::CyclicDependency,
            // A template that cannot be parsed can never have all placeholders bound.
            CompileError::UnboundPlaceholder { .. } | CompileError::MalformedTemplate { .. } => {
                CompileErrorKind::UnboundPlaceholder
            }
            CompileError::FilterAsInput { .. } => CompileErrorKind::FilterAsInput,
            CompileError::UpstreamScope { .. } => CompileErrorKind::UpstreamScope,
        }
    }
}

/// Raised while assembling a `Catalog` from declarations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeclarationError {
    #[error("Node '{0}' declares no scopes")]
    EmptyScopes(String),
    #[error("Node '{node}' lists scope '{scope}' more than once")]
    RepeatedScope { node: String, scope: Scope },
    #[error("Node name '{name}' is already declared for scope '{scope}'")]
    DuplicateName { name: String, scope: Scope },
    #[error("Node '{node}' overrides inputs for scope '{scope}', which it does not declare")]
    UnknownScopeOverride { node: String, scope: Scope },
    #[error("Node '{node}' has per-scope inputs but none for its scope '{scope}'")]
    MissingScopeInputs { node: String, scope: Scope },
    #[error("{kind} '{node}' has no call template")]
    MissingCall { node: String, kind: &'static str },
    #[error("{kind} '{node}' has no subproducers")]
    EmptyGroup { node: String, kind: &'static str },
    #[error("Producer '{0}' cannot have subproducers")]
    UnexpectedSubproducers(String),
    #[error("Node '{node}' references unknown subproducer '{child}'")]
    UnknownChild { node: String, child: String },
    #[error("Request for scope '{scope}' names unknown node '{node}'")]
    UnknownRequest { node: String, scope: Scope },
    #[error("Invalid declaration document: {0}")]
    Document(String),
}

//! Declarations and the scope-specialised dependency graph built from them.
pub mod builder;
pub mod catalog;
pub mod dag;
pub mod document;
pub mod node;

pub use builder::{combined_output, GraphBuilder};
pub use catalog::{BuildPlan, Catalog};
pub use dag::{Dependency, DependencyGraph, ScopedNode};
pub use document::Declarations;
pub use node::{Inputs, Node, NodeKind, NodeSpec};

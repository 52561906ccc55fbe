//! Compiles scope-tagged producer declarations into validated,
//! dependency-ordered, fully substituted call sequences.

pub mod analysis;
pub mod bindings;
pub mod codegen;
pub mod display;
pub mod graph;
pub mod pipeline;
pub mod store;
pub mod validation;

pub use codegen::{Config, ConfigValue, ResolvedCall};
pub use graph::{BuildPlan, Catalog, Declarations, NodeKind, NodeSpec};
pub use pipeline::{Compilation, Compiler, CompilerOptions};
pub use store::{ExternalInputs, NodeId, Quantity, Scope};
pub use validation::{CompileError, CompileErrorKind, DeclarationError, Warning, WarningKind};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::python::PyDeclarations>()?;
    Ok(())
}

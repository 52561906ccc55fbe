//! Quantity catalogue shared by every stage of the build.
pub mod registry;
pub mod types;

pub use registry::{ExternalInputs, Origin, QuantityRegistry, SharedOutputs};
pub use types::{NodeId, Quantity, Scope};

//! Cross-cutting checks run while a scope is built and compiled.
pub mod filters;
pub mod scope;
pub mod usage;

//! Error taxonomy, advisories and the rules that raise them.
pub mod diagnostics;
pub mod error;
pub mod rules;

pub use diagnostics::{Warning, WarningKind};
pub use error::{CompileError, CompileErrorKind, DeclarationError};

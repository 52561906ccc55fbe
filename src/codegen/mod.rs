//! Template parsing, configuration lookup and call emission.
pub mod compiler;
pub mod config;
pub mod template;

pub use compiler::{CompiledCalls, ResolvedCall, TemplateCompiler};
pub use config::{Config, ConfigValue};
pub use template::{Template, TemplateError};

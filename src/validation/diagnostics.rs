//! Non-fatal advisories collected alongside a successful compilation.
use crate::store::{Quantity, Scope};
use serde::Serialize;
use std::fmt;

/// The specific category of an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WarningKind {
    /// A declared input is never referenced by the call template.
    UnusedInput,
    /// A declared output is never referenced by the call template.
    UnusedOutput,
}

/// A structured advisory. Signals that declarations have drifted from usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub node: String,
    pub scope: Scope,
    pub quantity: Quantity,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            WarningKind::UnusedInput => "input",
            WarningKind::UnusedOutput => "output",
        };
        write!(
            f,
            "node '{}' declares {} '{}' but its call template never references it (scope '{}')",
            self.node, what, self.quantity, self.scope
        )
    }
}

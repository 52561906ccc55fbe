use crate::pipeline::Compilation;
use std::fmt::Write;

/// Renders a compiled scope as the straight-line program it stands for, one
/// `auto <frame> = <call>;` statement per call, advisories as trailing comments.
pub fn format_listing(compilation: &Compilation) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "// scope '{}': {} calls, {} -> {}",
        compilation.scope,
        compilation.calls.len(),
        compilation.root_frame,
        compilation.final_frame
    );
    for call in &compilation.calls {
        let _ = writeln!(out, "auto {} = {};", call.frame_out, call.call);
    }
    for warning in &compilation.warnings {
        let _ = writeln!(out, "// warning: {}", warning);
    }
    out
}

use crate::codegen::ResolvedCall;
use crate::pipeline::Compilation;
use crate::store::Quantity;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders how `target` comes to exist in a compiled scope: its producing
/// call, then recursively the producers of that call's inputs. Quantities
/// nothing in the scope produces are leaves marked `[external]`.
pub fn format_trace(compilation: &Compilation, target: &Quantity) -> String {
    let mut tracer = Tracer {
        compilation,
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match position_of(compilation, target) {
        Some(pos) => {
            let _ = writeln!(tracer.output, "TRACE for '{}' in scope '{}':", target, compilation.scope);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_call(pos, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: '{}' is not produced in scope '{}'", target, compilation.scope);
        }
    }
    tracer.output
}

fn position_of(compilation: &Compilation, quantity: &Quantity) -> Option<usize> {
    compilation.calls.iter().position(|c| c.outputs.contains(quantity))
}

struct Tracer<'a> {
    compilation: &'a Compilation,
    visited_at_level: HashMap<usize, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_call(&mut self, pos: usize, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&pos) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(pos, level);

        let call: &ResolvedCall = &self.compilation.calls[pos];
        let _ = writeln!(self.output, "{}[L{}] {} -> {} = {}", prefix, level, call.name, call.frame_out, call.call);

        let stem = build_child_stem(prefix);
        for (i, input) in call.inputs.iter().enumerate() {
            let connector = if i == call.inputs.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            // Only earlier calls can produce an input; a later one would be a different binding.
            match position_of(self.compilation, input).filter(|&p| p < pos) {
                Some(producer) => self.trace_call(producer, level + 1, &full_prefix),
                None => {
                    let _ = writeln!(self.output, "{}{} [external]", full_prefix, input);
                }
            }
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

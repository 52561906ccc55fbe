//! Turns a scheduled graph into fully substituted calls.
//!
//! Calls are chained through frames: each call consumes the frame produced by
//! its predecessor (`{df}`) and yields a new one, so the emitted sequence reads
//! as the straight-line program the execution engine runs.

use super::config::Config;
use super::template::{Template, FRAME, INPUT, INPUT_VEC, OUTPUT, OUTPUT_VEC, VEC_CLOSE, VEC_OPEN};
use crate::graph::{DependencyGraph, NodeKind, ScopedNode};
use crate::store::{NodeId, Quantity, Scope};
use crate::validation::{rules, CompileError, Warning};
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::{debug, warn};

/// One fully bound unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCall {
    pub node: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub inputs: Vec<Quantity>,
    pub outputs: Vec<Quantity>,
    pub frame_in: String,
    pub frame_out: String,
    pub call: String,
}

/// Calls and advisories for one scope, in schedule order.
#[derive(Debug, Clone, Default)]
pub struct CompiledCalls {
    pub calls: Vec<ResolvedCall>,
    pub warnings: Vec<Warning>,
}

fn quoted(list: &[Quantity]) -> Option<String> {
    if list.is_empty() {
        return None;
    }
    let names: Vec<String> = list.iter().map(|q| format!("\"{}\"", q)).collect();
    Some(names.join(", "))
}

pub struct TemplateCompiler<'a> {
    config: &'a Config,
    scope: &'a Scope,
    frame_prefix: &'a str,
}

impl<'a> TemplateCompiler<'a> {
    pub fn new(config: &'a Config, scope: &'a Scope, frame_prefix: &'a str) -> Self {
        Self { config, scope, frame_prefix }
    }

    /// `<prefix>_<scope>_<i>`.
    pub fn frame_name(&self, i: usize) -> String {
        format!("{}_{}_{}", self.frame_prefix, self.scope, i)
    }

    /// Compiles `order` (a schedule of `graph`) starting from `root_frame`.
    pub fn compile(
        &self,
        graph: &DependencyGraph,
        order: &[NodeIndex],
        root_frame: &str,
    ) -> Result<CompiledCalls, CompileError> {
        let mut out = CompiledCalls { calls: Vec::with_capacity(order.len()), warnings: Vec::new() };

        for (i, &idx) in order.iter().enumerate() {
            let frame_in = if i == 0 { root_frame.to_string() } else { self.frame_name(i) };
            let frame_out = self.frame_name(i + 1);
            let node = graph.node(idx);

            let template = Template::parse_call(&node.template).map_err(|reason| CompileError::MalformedTemplate {
                node: node.name.clone(),
                template: node.template.clone(),
                reason,
            })?;

            for warning in rules::usage::unused_io(node, &template, self.scope) {
                warn!(scope = %self.scope, "{}", warning);
                out.warnings.push(warning);
            }

            let call = self.bind(node, &template, &frame_in)?;
            debug!(scope = %self.scope, node = %node.name, frame = %frame_out, "{}", call);

            out.calls.push(ResolvedCall {
                node: node.node,
                name: node.name.clone(),
                kind: node.kind,
                inputs: node.inputs.to_vec(),
                outputs: node.outputs.to_vec(),
                frame_in,
                frame_out,
                call,
            });
        }
        Ok(out)
    }

    fn bind(&self, node: &ScopedNode, template: &Template, frame_in: &str) -> Result<String, CompileError> {
        template
            .render(|name| match name {
                FRAME => Some(frame_in.to_string()),
                INPUT => quoted(&node.inputs),
                OUTPUT => quoted(&node.outputs),
                INPUT_VEC => quoted(&node.inputs).map(|s| format!("{{{}}}", s)),
                OUTPUT_VEC => quoted(&node.outputs).map(|s| format!("{{{}}}", s)),
                VEC_OPEN => Some("{".to_string()),
                VEC_CLOSE => Some("}".to_string()),
                other => self.config.lookup(other, self.scope).map(|v| v.render()),
            })
            .map_err(|placeholder| CompileError::UnboundPlaceholder {
                node: node.name.clone(),
                placeholder,
                scope: self.scope.clone(),
            })
    }
}

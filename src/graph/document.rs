//! Loads declarations from a JSON document.
//!
//! ```json
//! {
//!   "externals": ["Electron_pt", "Electron_eta"],
//!   "nodes": [
//!     {"kind": "producer", "name": "ElectronPtCut", "scopes": ["ee"],
//!      "call": "physicsobject::CutMin<float>({df}, {output}, {input}, {min_electron_pt})",
//!      "input": ["Electron_pt"], "output": []},
//!     {"kind": "producer_group", "name": "GoodElectrons", "scopes": ["ee"],
//!      "call": "physicsobject::CombineMasks({df}, {output}, {input})",
//!      "input": [], "output": ["good_electrons_mask"], "subproducers": ["ElectronPtCut"]}
//!   ],
//!   "requests": {"ee": ["GoodElectrons"]}
//! }
//! ```
//!
//! Subproducers are referenced by name and must be declared earlier in the
//! document. A name may resolve to several declarations with disjoint scope
//! sets; all of those overlapping the parent's scopes become children.

use super::catalog::{BuildPlan, Catalog};
use super::node::{Inputs, NodeKind, NodeSpec};
use crate::store::{ExternalInputs, NodeId, Quantity, Scope};
use crate::validation::DeclarationError;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNode {
    kind: NodeKind,
    name: String,
    scopes: Vec<Scope>,
    #[serde(default)]
    call: Option<String>,
    #[serde(default)]
    input: Option<Inputs>,
    #[serde(default)]
    output: Option<Vec<Quantity>>,
    #[serde(default)]
    subproducers: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    externals: ExternalInputs,
    nodes: Vec<RawNode>,
    #[serde(default)]
    requests: IndexMap<Scope, Vec<String>>,
}

/// Everything a compiler needs, loaded from one document.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    pub catalog: Catalog,
    pub externals: ExternalInputs,
    pub plan: BuildPlan,
}

impl Declarations {
    pub fn from_json(json: &str) -> Result<Self, DeclarationError> {
        let raw: RawDocument = serde_json::from_str(json).map_err(|e| DeclarationError::Document(e.to_string()))?;

        let mut catalog = Catalog::new();
        for node in raw.nodes {
            let children = resolve_children(&catalog, &node)?;
            catalog.declare(NodeSpec {
                name: node.name,
                kind: node.kind,
                scopes: node.scopes,
                inputs: node.input,
                outputs: node.output,
                call: node.call,
                children,
            })?;
        }

        let mut plan = BuildPlan::new();
        for (scope, names) in raw.requests {
            let mut ids = Vec::with_capacity(names.len());
            for name in names {
                // A node declared only for other scopes is kept so compilation
                // can report the mismatch with its supported scopes.
                let id = catalog
                    .find(&name, &scope)
                    .or_else(|| catalog.find_all(&name).first().copied())
                    .ok_or_else(|| DeclarationError::UnknownRequest { node: name.clone(), scope: scope.clone() })?;
                ids.push(id);
            }
            plan.request(scope, ids);
        }

        debug!(nodes = catalog.len(), scopes = plan.len(), externals = raw.externals.len(), "declarations loaded");
        Ok(Self { catalog, externals: raw.externals, plan })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DeclarationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DeclarationError::Document(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }
}

fn resolve_children(catalog: &Catalog, node: &RawNode) -> Result<Vec<NodeId>, DeclarationError> {
    let mut children = Vec::new();
    for child in &node.subproducers {
        let before = children.len();
        children.extend(
            catalog
                .find_all(child)
                .iter()
                .copied()
                .filter(|&id| node.scopes.iter().any(|s| catalog[id].is_active(s))),
        );
        if children.len() == before {
            return Err(DeclarationError::UnknownChild { node: node.name.clone(), child: child.clone() });
        }
    }
    Ok(children)
}

//! The per-scope compilation pipeline: build, schedule, emit.

use crate::analysis::topology;
use crate::codegen::{Config, ResolvedCall, TemplateCompiler};
use crate::graph::{BuildPlan, Catalog, GraphBuilder};
use crate::store::{ExternalInputs, NodeId, Quantity, QuantityRegistry, Scope, SharedOutputs};
use crate::validation::{CompileError, Warning};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Frames are named `<frame_prefix>_<scope>_<i>`.
    pub frame_prefix: String,
    /// Scope compiled before all others; its outputs are visible to them.
    pub shared_scope: Option<Scope>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { frame_prefix: "df".to_string(), shared_scope: Some(Scope::from("global")) }
    }
}

/// The compiled schedule of one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    pub scope: Scope,
    pub root_frame: String,
    pub final_frame: String,
    pub calls: Vec<ResolvedCall>,
    pub warnings: Vec<Warning>,
}

impl Compilation {
    pub fn len(&self) -> usize { self.calls.len() }
    pub fn is_empty(&self) -> bool { self.calls.is_empty() }

    /// Every quantity created in this scope, in schedule order.
    pub fn produced(&self) -> impl Iterator<Item = &Quantity> {
        self.calls.iter().flat_map(|c| c.outputs.iter())
    }

    /// The call producing `quantity`, if any.
    pub fn producer_of(&self, quantity: &Quantity) -> Option<&ResolvedCall> {
        self.calls.iter().find(|c| c.outputs.contains(quantity))
    }

    /// Outputs of this scope keyed to their producers, for scopes compiled after it.
    pub fn shared_outputs(&self) -> SharedOutputs {
        let mut shared = SharedOutputs::new();
        for call in &self.calls {
            for quantity in &call.outputs {
                shared.insert(quantity.clone(), call.node, call.name.clone());
            }
        }
        shared
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Compiles declarations from a `Catalog` into per-scope call sequences.
///
/// Holds only shared references; one `Compiler` serves any number of scopes,
/// concurrently when driven through `compile_all`.
pub struct Compiler<'a> {
    catalog: &'a Catalog,
    externals: &'a ExternalInputs,
    config: &'a Config,
    options: CompilerOptions,
}

impl<'a> Compiler<'a> {
    pub fn new(catalog: &'a Catalog, externals: &'a ExternalInputs, config: &'a Config) -> Self {
        Self { catalog, externals, config, options: CompilerOptions::default() }
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompilerOptions { &self.options }

    /// Compiles `request` for `scope` in isolation, from the scope's own root frame.
    pub fn compile_scope(&self, scope: &Scope, request: &[NodeId]) -> Result<Compilation, CompileError> {
        self.compile_with(scope, request, SharedOutputs::new(), None)
    }

    #[instrument(level = "info", skip_all, fields(scope = %scope, requested = request.len()))]
    fn compile_with(
        &self,
        scope: &Scope,
        request: &[NodeId],
        shared: SharedOutputs,
        root_frame: Option<String>,
    ) -> Result<Compilation, CompileError> {
        let registry = QuantityRegistry::with_shared(self.externals.clone(), shared);
        let graph = GraphBuilder::with_registry(self.catalog, scope.clone(), registry).build(request)?;
        let order = topology::schedule(&graph)?;

        let emitter = TemplateCompiler::new(self.config, scope, &self.options.frame_prefix);
        let root_frame = root_frame.unwrap_or_else(|| emitter.frame_name(0));
        let compiled = emitter.compile(&graph, &order, &root_frame)?;

        let final_frame = compiled.calls.last().map(|c| c.frame_out.clone()).unwrap_or_else(|| root_frame.clone());
        info!(calls = compiled.calls.len(), warnings = compiled.warnings.len(), final_frame = %final_frame, "scope compiled");

        Ok(Compilation {
            scope: scope.clone(),
            root_frame,
            final_frame,
            calls: compiled.calls,
            warnings: compiled.warnings,
        })
    }

    /// Compiles every scope in `plan`.
    ///
    /// The shared scope, when requested, goes first: what it produces is
    /// readable by the other scopes, still attributed to its producer, and its
    /// final frame becomes their root. The remaining scopes are independent and
    /// compiled in parallel.
    pub fn compile_all(&self, plan: &BuildPlan) -> BTreeMap<Scope, Result<Compilation, CompileError>> {
        let mut results = BTreeMap::new();
        let mut upstream = SharedOutputs::new();
        let mut root_frame = None;
        let mut failed_upstream = None;

        let shared = self.options.shared_scope.as_ref().filter(|s| plan.get(s).is_some());
        if let Some(shared) = shared {
            let result = self.compile_with(shared, plan.get(shared).unwrap_or(&[]), SharedOutputs::new(), None);
            match &result {
                Ok(compilation) => {
                    upstream = compilation.shared_outputs();
                    root_frame = Some(compilation.final_frame.clone());
                }
                Err(_) => failed_upstream = Some(shared.clone()),
            }
            results.insert(shared.clone(), result);
        }

        let rest: Vec<(&Scope, &[NodeId])> = plan.iter().filter(|(scope, _)| Some(*scope) != shared).collect();
        let compiled: Vec<(Scope, Result<Compilation, CompileError>)> = rest
            .par_iter()
            .map(|&(scope, request)| {
                let result = match &failed_upstream {
                    Some(upstream) => Err(CompileError::UpstreamScope { scope: scope.clone(), upstream: upstream.clone() }),
                    None => self.compile_with(scope, request, upstream.clone(), root_frame.clone()),
                };
                (scope.clone(), result)
            })
            .collect();
        results.extend(compiled);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Declarations, NodeSpec};
    use crate::validation::CompileErrorKind;
    use std::collections::HashSet;

    fn compile(catalog: &Catalog, externals: &[&str], scope: &str, request: &[NodeId]) -> Result<Compilation, CompileError> {
        let externals: ExternalInputs = externals.iter().copied().collect();
        let config = Config::new();
        Compiler::new(catalog, &externals, &config).compile_scope(&scope.into(), request)
    }

    fn names(c: &Compilation) -> Vec<&str> {
        c.calls.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_single_producer_consumes_external() {
        let mut cat = Catalog::new();
        let p = cat.declare(NodeSpec::producer("Producer").call("f({df}, {output}, {input})").inputs(["X"]).outputs(["Y"]).scopes(["s"])).unwrap();

        let c = compile(&cat, &["X"], "s", &[p]).unwrap();
        assert_eq!(names(&c), vec!["Producer"]);
        assert_eq!(c.calls[0].inputs, vec![Quantity::from("X")]);
        assert_eq!(c.calls[0].call, r#"f(df_s_0, "Y", "X")"#);
        assert_eq!(c.final_frame, "df_s_1");
    }

    fn scenario_b(with_group_call: bool) -> (Catalog, NodeId, NodeId) {
        let mut cat = Catalog::new();
        cat.declare(NodeSpec::producer("P1").call("f({df}, {output})").inputs(Vec::<Quantity>::new()).outputs(["A"]).scopes(["s", "t"])).unwrap();
        let p2 = cat.declare(NodeSpec::producer("P2").call("g({df}, {output}, {input})").inputs(["A"]).outputs(["B"]).scopes(["s"])).unwrap();
        let mut group = NodeSpec::group("G").scopes(["s", "t"]).subproducers([NodeId(0), p2]);
        if with_group_call {
            group = group.call("h({df}, {output}, {input})").inputs(["A", "B"]).outputs(["C"]);
        }
        let g = cat.declare(group).unwrap();
        (cat, g, p2)
    }

    #[test]
    fn test_group_children_run_first() {
        let (cat, g, _) = scenario_b(false);
        assert_eq!(names(&compile(&cat, &[], "s", &[g]).unwrap()), vec!["P1", "P2"]);

        let (cat, g, _) = scenario_b(true);
        let c = compile(&cat, &[], "s", &[g]).unwrap();
        assert_eq!(names(&c), vec!["P1", "P2", "G"]);
        assert_eq!(c.calls[2].call, r#"h(df_s_2, "C", "A", "B")"#);
    }

    #[test]
    fn test_group_in_scope_missing_a_child() {
        let (cat, g, p2) = scenario_b(true);

        let err = compile(&cat, &[], "t", &[p2]).unwrap_err();
        assert_eq!(err.kind(), CompileErrorKind::ScopeMismatch);

        let err = compile(&cat, &[], "t", &[g]).unwrap_err();
        assert_eq!(err, CompileError::MissingDependency { node: "G".into(), quantity: "B".into(), scope: "t".into() });
    }

    #[test]
    fn test_duplicate_production_names_both_nodes() {
        let mut cat = Catalog::new();
        let a = cat.declare(NodeSpec::producer("First").call("f({df}, {output})").outputs(["Z"]).scopes(["s"])).unwrap();
        let b = cat.declare(NodeSpec::producer("Second").call("g({df}, {output})").outputs(["Z"]).scopes(["s"])).unwrap();

        let err = compile(&cat, &[], "s", &[a, b]).unwrap_err();
        assert_eq!(err, CompileError::DuplicateProduction {
            quantity: "Z".into(),
            scope: "s".into(),
            first: "First".into(),
            second: "Second".into(),
        });
    }

    #[test]
    fn test_filter_flag_cannot_be_consumed() {
        let mut cat = Catalog::new();
        let v = cat.declare(NodeSpec::filter("V").call("filter({df}, {output})").outputs(["W"]).scopes(["s"])).unwrap();
        let f = cat.declare(NodeSpec::producer("F").call("f({df}, {output}, {input})").inputs(["W"]).outputs(["Y"]).scopes(["s"])).unwrap();

        let err = compile(&cat, &[], "s", &[v, f]).unwrap_err();
        assert_eq!(err.kind(), CompileErrorKind::FilterAsInput);
        assert!(matches!(err, CompileError::FilterAsInput { ref filter, ref node, .. } if filter == "V" && node == "F"));
    }

    #[test]
    fn test_missing_config_parameter() {
        let mut cat = Catalog::new();
        let p = cat.declare(
            NodeSpec::producer("ElectronPtCut")
                .call("physicsobject::CutMin<float>({df}, {output}, {input}, {min_electron_pt})")
                .inputs(["Electron_pt"]).outputs(["pt_mask"]).scopes(["ee"]),
        ).unwrap();

        let err = compile(&cat, &["Electron_pt"], "ee", &[p]).unwrap_err();
        assert_eq!(err, CompileError::UnboundPlaceholder {
            node: "ElectronPtCut".into(),
            placeholder: "min_electron_pt".into(),
            scope: "ee".into(),
        });
    }

    #[test]
    fn test_data_cycle_is_reported() {
        let mut cat = Catalog::new();
        let p1 = cat.declare(NodeSpec::producer("P1").call("f({df}, {output}, {input})").inputs(["B"]).outputs(["A"]).scopes(["s"])).unwrap();
        let p2 = cat.declare(NodeSpec::producer("P2").call("f({df}, {output}, {input})").inputs(["A"]).outputs(["B"]).scopes(["s"])).unwrap();

        let err = compile(&cat, &[], "s", &[p1, p2]).unwrap_err();
        assert_eq!(err, CompileError::CyclicDependency { scope: "s".into(), cycle: vec!["P1".into(), "P2".into(), "P1".into()] });
    }

    const ANALYSIS: &str = r#"{
        "externals": ["Electron_pt", "Electron_eta", "Electron_mvaIso", "PV_npvs", "genWeight"],
        "nodes": [
            {"kind": "producer", "name": "PUweights", "scopes": ["global"],
             "call": "reweighting::puweights({df}, {output}, {input}, \"{PU_reweighting_file}\")",
             "input": ["PV_npvs"], "output": ["puweight"]},
            {"kind": "producer", "name": "ElectronPtCut", "scopes": ["ee", "em"],
             "call": "physicsobject::CutMin<float>({df}, {output}, {input}, {min_electron_pt})",
             "input": ["Electron_pt"], "output": []},
            {"kind": "producer", "name": "ElectronEtaCut", "scopes": ["ee", "em"],
             "call": "physicsobject::CutAbsMax<float>({df}, {output}, {input}, {max_electron_eta})",
             "input": ["Electron_eta"], "output": []},
            {"kind": "producer", "name": "ElectronIDCut", "scopes": ["ee"],
             "call": "physicsobject::electron::CutID({df}, {output}, \"{electron_id}\")",
             "input": ["Electron_mvaIso"], "output": []},
            {"kind": "producer_group", "name": "GoodElectrons", "scopes": ["ee", "em"],
             "call": "physicsobject::CombineMasks({df}, {output}, {input})",
             "input": [], "output": ["good_electrons_mask"],
             "subproducers": ["ElectronPtCut", "ElectronEtaCut", "ElectronIDCut"]},
            {"kind": "producer", "name": "NumberOfGoodElectrons", "scopes": ["ee", "em"],
             "call": "quantities::NumberOfGoodObjects({df}, {output}, {input})",
             "input": ["good_electrons_mask"], "output": ["ngood_electrons"]},
            {"kind": "producer", "name": "EventWeight", "scopes": ["ee", "em"],
             "call": "basefunctions::Product({df}, {output}, {input_vec})",
             "input": ["puweight", "genWeight"], "output": ["weight"]},
            {"kind": "filter", "name": "ElectronFilter", "scopes": ["ee"],
             "call": "basefunctions::FilterThreshold({df}, {input}, {min_electrons}, \"good electrons\")",
             "input": ["ngood_electrons"]}
        ],
        "requests": {
            "global": ["PUweights"],
            "ee": ["EventWeight", "NumberOfGoodElectrons", "ElectronFilter", "GoodElectrons"],
            "em": ["NumberOfGoodElectrons", "EventWeight", "GoodElectrons"]
        }
    }"#;

    fn analysis_config() -> Config {
        Config::from_json(
            r#"{
                "defaults": {"PU_reweighting_file": "data/pileup.json", "min_electron_pt": 25.0,
                             "max_electron_eta": 2.5, "electron_id": "Electron_mvaIso_WP90", "min_electrons": 1},
                "scopes": {"em": {"min_electron_pt": 15.0}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_compile_all_chains_shared_scope() {
        let decl = Declarations::from_json(ANALYSIS).unwrap();
        let config = analysis_config();
        let results = Compiler::new(&decl.catalog, &decl.externals, &config).compile_all(&decl.plan);

        let scopes: Vec<&str> = results.keys().map(|s| s.as_str()).collect();
        assert_eq!(scopes, vec!["ee", "em", "global"]);

        let global = results[&Scope::from("global")].as_ref().unwrap();
        assert_eq!(global.final_frame, "df_global_1");

        let ee = results[&Scope::from("ee")].as_ref().unwrap();
        assert_eq!(
            names(ee),
            vec!["ElectronPtCut", "ElectronEtaCut", "ElectronIDCut", "GoodElectrons", "NumberOfGoodElectrons", "EventWeight", "ElectronFilter"]
        );
        assert_eq!(ee.root_frame, "df_global_1");
        assert_eq!(ee.calls[0].call, r#"physicsobject::CutMin<float>(df_global_1, "ElectronPtCut_output", "Electron_pt", 25.0)"#);
        assert_eq!(
            ee.calls[3].call,
            r#"physicsobject::CombineMasks(df_ee_3, "good_electrons_mask", "ElectronPtCut_output", "ElectronEtaCut_output", "ElectronIDCut_output")"#
        );
        assert_eq!(ee.calls[5].call, r#"basefunctions::Product(df_ee_5, "weight", {"puweight", "genWeight"})"#);
        assert_eq!(ee.calls[6].call, r#"basefunctions::FilterThreshold(df_ee_6, "ngood_electrons", 1, "good electrons")"#);

        // ElectronIDCut never references its input.
        assert_eq!(ee.warnings.len(), 1);
        assert_eq!(ee.warnings[0].node, "ElectronIDCut");

        let em = results[&Scope::from("em")].as_ref().unwrap();
        assert_eq!(names(em), vec!["ElectronPtCut", "ElectronEtaCut", "GoodElectrons", "NumberOfGoodElectrons", "EventWeight"]);
        assert!(em.calls[0].call.ends_with("15.0)"));
    }

    #[test]
    fn test_failed_shared_scope_blocks_dependants() {
        let decl = Declarations::from_json(ANALYSIS).unwrap();
        let config = Config::new();
        let results = Compiler::new(&decl.catalog, &decl.externals, &config).compile_all(&decl.plan);

        assert_eq!(results[&Scope::from("global")].as_ref().unwrap_err().kind(), CompileErrorKind::UnboundPlaceholder);
        assert_eq!(
            results[&Scope::from("ee")].as_ref().unwrap_err(),
            &CompileError::UpstreamScope { scope: "ee".into(), upstream: "global".into() }
        );
    }

    #[test]
    fn test_schedule_is_topological_and_placeholders_bound() {
        let decl = Declarations::from_json(ANALYSIS).unwrap();
        let config = analysis_config();
        let results = Compiler::new(&decl.catalog, &decl.externals, &config).compile_all(&decl.plan);

        for compilation in results.values() {
            let compilation = compilation.as_ref().unwrap();
            let mut available: HashSet<&Quantity> = decl.externals.iter().collect();
            if compilation.scope.as_str() != "global" {
                available.extend(results[&Scope::from("global")].as_ref().unwrap().produced());
            }
            for call in &compilation.calls {
                for input in &call.inputs {
                    assert!(available.contains(input), "{} consumed before production in {}", input, compilation.scope);
                }
                available.extend(call.outputs.iter());
                for name in ["{df}", "{input}", "{output}", "{min_", "{electron_id}"] {
                    assert!(!call.call.contains(name), "leftover placeholder in {}", call.call);
                }
            }
        }
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let decl = Declarations::from_json(ANALYSIS).unwrap();
        let config = analysis_config();
        let compiler = Compiler::new(&decl.catalog, &decl.externals, &config);

        let first = compiler.compile_all(&decl.plan);
        let second = compiler.compile_all(&decl.plan);
        for (scope, result) in &first {
            let a = result.as_ref().unwrap().to_json().unwrap();
            let b = second[scope].as_ref().unwrap().to_json().unwrap();
            assert_eq!(a, b);
        }
    }

    fn compile_all(catalog: &Catalog, plan: &BuildPlan) -> BTreeMap<Scope, Result<Compilation, CompileError>> {
        let externals = ExternalInputs::new();
        let config = Config::new();
        Compiler::new(catalog, &externals, &config).compile_all(plan)
    }

    #[test]
    fn test_shared_filter_flag_cannot_be_consumed_downstream() {
        let mut cat = Catalog::new();
        let v = cat.declare(NodeSpec::filter("V").call("filter({df}, {output})").outputs(["W"]).scopes(["global"])).unwrap();
        let f = cat.declare(NodeSpec::producer("F").call("f({df}, {output}, {input})").inputs(["W"]).outputs(["Y"]).scopes(["ee"])).unwrap();
        let mut plan = BuildPlan::new();
        plan.request("global", [v]);
        plan.request("ee", [f]);

        let results = compile_all(&cat, &plan);
        assert!(results[&Scope::from("global")].is_ok());
        let err = results[&Scope::from("ee")].as_ref().unwrap_err();
        assert_eq!(err.kind(), CompileErrorKind::FilterAsInput);
        assert!(matches!(err, CompileError::FilterAsInput { filter, node, .. } if filter == "V" && node == "F"));
    }

    #[test]
    fn test_reproducing_a_shared_output_names_its_producer() {
        let mut cat = Catalog::new();
        let g = cat.declare(NodeSpec::producer("GlobalP").call("f({df}, {output})").outputs(["Z"]).scopes(["global"])).unwrap();
        let e = cat.declare(NodeSpec::producer("EEP").call("g({df}, {output})").outputs(["Z"]).scopes(["ee"])).unwrap();
        let mut plan = BuildPlan::new();
        plan.request("global", [g]);
        plan.request("ee", [e]);

        let results = compile_all(&cat, &plan);
        let err = results[&Scope::from("ee")].as_ref().unwrap_err();
        assert_eq!(err, &CompileError::DuplicateProduction {
            quantity: "Z".into(),
            scope: "ee".into(),
            first: "GlobalP".into(),
            second: "EEP".into(),
        });
        let message = err.to_string();
        assert!(message.contains("GlobalP") && message.contains("EEP"), "{}", message);
    }

    #[test]
    fn test_shared_output_is_readable_downstream() {
        let mut cat = Catalog::new();
        let g = cat.declare(NodeSpec::producer("GlobalP").call("f({df}, {output})").outputs(["Z"]).scopes(["global"])).unwrap();
        let e = cat.declare(NodeSpec::producer("EEP").call("g({df}, {output}, {input})").inputs(["Z"]).outputs(["Y"]).scopes(["ee"])).unwrap();
        let mut plan = BuildPlan::new();
        plan.request("global", [g]);
        plan.request("ee", [e]);

        let results = compile_all(&cat, &plan);
        let ee = results[&Scope::from("ee")].as_ref().unwrap();
        assert_eq!(ee.calls[0].call, r#"g(df_global_1, "Y", "Z")"#);
    }

    #[test]
    fn test_shared_group_is_scheduled_once() {
        let mut cat = Catalog::new();
        let lv = cat.declare(NodeSpec::producer("LVGenParticle1").call("lorentzvectors::build({df}, {output}, {input})").inputs(["GenPart_pt"]).outputs(["gen_p4_1"]).scopes(["mm"])).unwrap();
        let inner = cat.declare(NodeSpec::group("GenParticles").scopes(["mm"]).subproducers([lv])).unwrap();
        let a = cat.declare(NodeSpec::group("GenDiTau").scopes(["mm"]).subproducers([inner])).unwrap();
        let b = cat.declare(NodeSpec::group("GenMatching").scopes(["mm"]).subproducers([inner])).unwrap();

        let c = compile(&cat, &["GenPart_pt"], "mm", &[a, b, inner]).unwrap();
        assert_eq!(names(&c), vec!["LVGenParticle1"]);
    }
}

//! Advisory rule: declared inputs/outputs the call template never mentions.

use crate::codegen::template::{Template, INPUT, INPUT_VEC, OUTPUT, OUTPUT_VEC};
use crate::graph::ScopedNode;
use crate::store::Scope;
use crate::validation::{Warning, WarningKind};

/// One warning per unreferenced quantity. Never fatal.
pub(crate) fn unused_io(node: &ScopedNode, template: &Template, scope: &Scope) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let uses_inputs = template.references(INPUT) || template.references(INPUT_VEC);
    let uses_outputs = template.references(OUTPUT) || template.references(OUTPUT_VEC);

    let unused_inputs = node.inputs.iter().filter(|_| !uses_inputs).map(|q| (WarningKind::UnusedInput, q));
    let unused_outputs = node.outputs.iter().filter(|_| !uses_outputs).map(|q| (WarningKind::UnusedOutput, q));
    for (kind, quantity) in unused_inputs.chain(unused_outputs) {
        warnings.push(Warning {
            kind,
            node: node.name.clone(),
            scope: scope.clone(),
            quantity: quantity.clone(),
        });
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::store::NodeId;
    use rstest::rstest;
    use smallvec::smallvec;

    fn scoped(template: &str) -> ScopedNode {
        ScopedNode {
            node: NodeId(0),
            name: "TauPtCorrection".into(),
            kind: NodeKind::Producer,
            template: template.into(),
            inputs: smallvec!["Tau_pt".into(), "Tau_decayMode".into()],
            outputs: smallvec!["tau_pt_corrected".into()],
        }
    }

    #[test]
    fn test_unreferenced_inputs_are_reported() {
        let node = scoped("physicsobject::tau::PtCorrection({df}, {output}, {tau_dm0_ES})");
        let template = Template::parse_call(&node.template).unwrap();
        let warnings = unused_io(&node, &template, &"mt".into());

        let kinds: Vec<(WarningKind, &str)> = warnings.iter().map(|w| (w.kind, w.quantity.as_str())).collect();
        assert_eq!(kinds, vec![(WarningKind::UnusedInput, "Tau_pt"), (WarningKind::UnusedInput, "Tau_decayMode")]);
    }

    #[rstest]
    #[case("physicsobject::tau::PtCorrection({df}, {input})")]
    #[case("physicsobject::tau::PtCorrection({df}, {vec_open}{input}{vec_close})")]
    #[case("physicsobject::tau::PtCorrection({df}, {input_vec})")]
    fn test_unreferenced_output_is_reported(#[case] source: &str) {
        let node = scoped(source);
        let template = Template::parse_call(&node.template).unwrap();
        let warnings = unused_io(&node, &template, &"mt".into());

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnusedOutput);
        assert_eq!(warnings[0].quantity.as_str(), "tau_pt_corrected");
        assert_eq!(warnings[0].node, "TauPtCorrection");
    }

    #[test]
    fn test_vec_placeholders_count_as_usage() {
        let node = scoped("physicsobject::tau::PtCorrection({df}, {output_vec}, {input_vec})");
        let template = Template::parse_call(&node.template).unwrap();
        assert!(unused_io(&node, &template, &"mt".into()).is_empty());
    }
}

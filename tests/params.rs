mod util;
use std::sync::Arc;

use dof_assembly::params::AssemblyOptions;
use dof_assembly::prelude::*;
use util::*;

#[test]
fn parameter_set_loads_from_json() {
    let p: ParameterSet = serde_json::from_str(
        r#"{ "BLOCK_MATRIX": true, "outputLevel": "stats", "name": "K", "maxIter": 50, "solverTol": 1e-8 }"#,
    )
    .unwrap();
    assert_eq!(p.get("maxIter"), Some(&ParamValue::Int(50)));
    assert_eq!(p.get("solverTol"), Some(&ParamValue::Double(1e-8)));

    let opts = AssemblyOptions::from_params(&p).unwrap();
    assert!(opts.block_matrix);
    assert_eq!(opts.output_level, OutputLevel::Stats);
    assert_eq!(opts.name, "K");

    let back: ParameterSet = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
    assert_eq!(back, p);
}

#[test]
fn factory_honors_block_matrix_flag() {
    let graph = || {
        let mut g = chain_graph(NoComm, 2, &[0]);
        g.init_complete().unwrap();
        Arc::new(g)
    };
    let on = ParameterSet::parse_strings(&["BLOCK_MATRIX"]);
    let off = ParameterSet::parse_strings(&["BLOCK_MATRIX false", "UNRELATED_KEY 3"]);
    assert_eq!(create_matrix(graph(), &on).unwrap().type_name(), "BlockRows");
    assert_eq!(create_matrix(graph(), &off).unwrap().type_name(), "ScalarRows");
}

#[test]
fn uninterpretable_values_are_configuration_errors() {
    for bad in [["BLOCK_MATRIX maybe"], ["outputLevel LOUD"]] {
        let p = ParameterSet::parse_strings(&bad);
        assert!(matches!(
            AssemblyOptions::from_params(&p),
            Err(AssemblyError::Configuration(_))
        ));
    }
}

use std::collections::BTreeSet;

use proptest::prelude::*;

use skillgate::analyzer::{self, ActiveCapabilities, StaticAnalyzer};
use skillgate::collab::{Generation, interpret};

fn python_like() -> impl Strategy<Value = String> {
    let line = prop_oneof![
        Just("import os".to_string()),
        Just("from json import dumps".to_string()),
        Just("x = eval('1')".to_string()),
        Just("def f(a, b=(1, [2, {3: 4}])):".to_string()),
        Just("    return f'{a!r:>10}'".to_string()),
        Just("s = \"\"\"unterminated".to_string()),
        Just("getattr(obj, '__class__')".to_string()),
        r"[ -~]{0,40}",
    ];
    prop::collection::vec(line, 0..12).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn analyze_never_panics_on_arbitrary_text(source in any::<String>()) {
        let _ = analyzer::analyze(&source);
    }

    #[test]
    fn analyze_never_panics_on_python_like_text(source in python_like()) {
        let result = StaticAnalyzer::default().analyze_source(&source, &BTreeSet::new(), &ActiveCapabilities::new());
        prop_assert_eq!(result.clean, result.issues.is_empty());
    }

    #[test]
    fn interpret_never_panics(raw in any::<String>()) {
        match interpret(&raw) {
            Generation::Source(code) => prop_assert_eq!(code.trim(), code.as_str()),
            Generation::Infeasible(reason) => prop_assert_eq!(reason.trim(), reason.as_str()),
        }
    }
}

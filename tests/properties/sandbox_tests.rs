use std::path::Component;

use proptest::prelude::*;
use tempfile::TempDir;

use skillgate::security::{ADMIN_WRITABLE, AGENT_WRITABLE, Sandbox, validate_identifier};

fn arb_segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("..".to_string()),
        Just(".".to_string()),
        Just("profiles".to_string()),
        Just("proposals".to_string()),
        Just("skills".to_string()),
        r"[a-zA-Z0-9_.\-]{1,12}",
    ]
}

fn arb_relative_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(arb_segment(), 1..6), any::<bool>()).prop_map(|(segments, absolute)| {
        let joined = segments.join("/");
        if absolute { format!("/{joined}") } else { joined }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn resolved_paths_stay_in_allowed_directories(target in arb_relative_path()) {
        let temp = TempDir::new().unwrap();
        for sandbox in [Sandbox::agent(temp.path()).unwrap(), Sandbox::admin(temp.path()).unwrap()] {
            if let Ok(resolved) = sandbox.resolve(&target) {
                let relative = resolved.strip_prefix(sandbox.root()).unwrap();
                let first = match relative.components().next() {
                    Some(Component::Normal(segment)) => segment.to_string_lossy().into_owned(),
                    other => panic!("unexpected first component {other:?}"),
                };
                prop_assert!(sandbox.allowed().iter().any(|allowed| *allowed == first));
                prop_assert!(!relative.components().any(|c| matches!(c, Component::ParentDir)));
            }
        }
    }

    #[test]
    fn escaping_targets_are_refused(depth in 1usize..4, tail in r"[a-z]{1,8}") {
        let temp = TempDir::new().unwrap();
        let sandbox = Sandbox::agent(temp.path()).unwrap();
        let target = format!("proposals/{}{tail}", "../".repeat(depth + 1));
        prop_assert!(sandbox.resolve(&target).is_err());
    }

    #[test]
    fn valid_identifiers_are_single_plain_segments(value in r"[a-zA-Z0-9_.\-/]{0,16}") {
        if validate_identifier(&value).is_ok() {
            prop_assert!(!value.is_empty());
            prop_assert!(!value.contains('/'));
            prop_assert!(value != "." && value != "..");
        }
    }
}

#[test]
fn allow_lists_differ_by_role() {
    assert!(AGENT_WRITABLE.contains(&"profiles"));
    assert!(!AGENT_WRITABLE.contains(&"skills"));
    assert!(ADMIN_WRITABLE.contains(&"skills"));
}

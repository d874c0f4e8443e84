//! Capability interplay between a proposal and the active skill set.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::analyzer::policy::SafetyPolicy;

/// Active skill name to the capability tokens it holds.
pub type ActiveCapabilities = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompositionWarning {
    Overlap {
        skill: String,
        shared: Vec<String>,
    },
    SensitiveCombination {
        first: String,
        second: String,
        hazard: String,
    },
}

impl fmt::Display for CompositionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overlap { skill, shared } => write!(
                f,
                "Proposed skill shares capabilities with '{skill}': {}",
                shared.join(", ")
            ),
            Self::SensitiveCombination {
                first,
                second,
                hazard,
            } => write!(f, "Proposed skill has both {first} and {second}; {hazard}"),
        }
    }
}

/// Advisory warnings only; nothing here blocks a proposal.
#[must_use]
pub fn analyze_composition(
    proposed: &BTreeSet<String>,
    active: &ActiveCapabilities,
    policy: &SafetyPolicy,
) -> Vec<CompositionWarning> {
    let mut warnings: Vec<CompositionWarning> = active
        .iter()
        .filter_map(|(skill, held)| {
            let shared: Vec<String> = proposed.intersection(held).cloned().collect();
            (!shared.is_empty()).then(|| CompositionWarning::Overlap {
                skill: skill.clone(),
                shared,
            })
        })
        .collect();

    for pair in &policy.sensitive_pairs {
        if proposed.contains(&pair.first) && proposed.contains(&pair.second) {
            warnings.push(CompositionWarning::SensitiveCombination {
                first: pair.first.clone(),
                second: pair.second.clone(),
                hazard: pair.hazard.clone(),
            });
        }
    }

    warnings
}

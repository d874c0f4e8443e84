//! Static analysis of generated skill code.
//!
//! Two independent checks run over a proposal's implementation:
//!
//! - [`safety`]: forbidden imports, forbidden builtin calls and suspicious
//!   string literals, found by lexing and parsing the Python source into a
//!   block tree. Nothing is ever executed.
//! - [`composition`]: capability overlap with skills that are already active,
//!   plus sensitive capability combinations.
//!
//! Safety issues block a proposal; composition warnings are advisory.

pub mod composition;
pub mod lexer;
pub mod policy;
pub mod safety;
pub mod tree;

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

pub use composition::{ActiveCapabilities, CompositionWarning, analyze_composition};
pub use policy::SafetyPolicy;
pub use safety::SafetyIssue;

/// Scan `source` with the default policy.
#[must_use]
pub fn analyze(source: &str) -> Vec<SafetyIssue> {
    safety::scan(source, &SafetyPolicy::default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisResult {
    pub clean: bool,
    pub issues: Vec<SafetyIssue>,
    pub warnings: Vec<CompositionWarning>,
}

impl AnalysisResult {
    #[must_use]
    pub const fn has_critical_issues(&self) -> bool {
        !self.clean
    }

    #[must_use]
    pub fn issue_messages(&self) -> Vec<String> {
        self.issues.iter().map(ToString::to_string).collect()
    }

    #[must_use]
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }

    /// One line for the review history note.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.clean {
            format!("clean, {} composition warning(s)", self.warnings.len())
        } else {
            format!(
                "{} issue(s), {} composition warning(s)",
                self.issues.len(),
                self.warnings.len()
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticAnalyzer {
    policy: SafetyPolicy,
}

impl StaticAnalyzer {
    #[must_use]
    pub const fn new(policy: SafetyPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub const fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    #[must_use]
    pub fn analyze_source(
        &self,
        source: &str,
        proposed: &BTreeSet<String>,
        active: &ActiveCapabilities,
    ) -> AnalysisResult {
        let issues = safety::scan(source, &self.policy);
        AnalysisResult {
            clean: issues.is_empty(),
            issues,
            warnings: analyze_composition(proposed, active, &self.policy),
        }
    }

    /// Read and analyze an implementation file. An unreadable file is unclean.
    #[must_use]
    pub fn analyze_file(
        &self,
        path: &Path,
        proposed: &BTreeSet<String>,
        active: &ActiveCapabilities,
    ) -> AnalysisResult {
        match std::fs::read_to_string(path) {
            Ok(source) => self.analyze_source(&source, proposed, active),
            Err(err) => AnalysisResult {
                clean: false,
                issues: vec![SafetyIssue::Unreadable {
                    message: err.to_string(),
                }],
                warnings: Vec::new(),
            },
        }
    }
}

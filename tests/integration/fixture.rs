use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use skillgate::collab::{CodeGenerator, FixedApprover, SystemContext};
use skillgate::pipeline::{GatePolicy, Orchestrator};
use skillgate::security::Sandbox;
use skillgate::storage::{Manifest, ProposalRecord, ProposalSpec, ProposalStore};
use skillgate::Result;

// =============================================================================
// Canned sources
// =============================================================================

pub const CLOCK_SOURCE: &str = r#"from datetime import datetime

from skills.base import BaseSkill


class ClockSkill(BaseSkill):
    """Tells the current time."""

    name = "clock"

    def handle(self, event, ctx):
        if event.type != "clock_request":
            return None
        now = datetime.now().strftime("%H:%M")
        return {"success": True, "output": f"It is {now}"}
"#;

/// The clock skill with a forbidden import on line 1.
pub fn subprocess_clock() -> String {
    format!("import subprocess\n{CLOCK_SOURCE}")
}

// =============================================================================
// Collaborators
// =============================================================================

/// Returns the same text for every proposal.
pub struct CannedGenerator(pub String);

impl CodeGenerator for CannedGenerator {
    fn generate(&self, _spec: &ProposalSpec, _system: &SystemContext) -> Result<String> {
        Ok(self.0.clone())
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// An isolated data root with an admin proposal store.
pub struct PipelineFixture {
    pub temp_dir: TempDir,
    pub store: ProposalStore,
    pub approver: Arc<FixedApprover>,
}

impl PipelineFixture {
    pub fn new(approve: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = ProposalStore::new(Sandbox::admin(temp_dir.path()).expect("admin sandbox"));
        let approver = Arc::new(if approve {
            FixedApprover::approving()
        } else {
            FixedApprover::denying()
        });
        Self {
            temp_dir,
            store,
            approver,
        }
    }

    /// Canonical data root.
    pub fn root(&self) -> &Path {
        self.store.sandbox().root()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    pub fn orchestrator(&self, source: &str, gates: GatePolicy) -> Orchestrator {
        Orchestrator::new(self.store.clone(), self.approver.clone())
            .with_gates(gates)
            .with_generator(Box::new(CannedGenerator(source.to_string())))
    }

    pub fn propose(&self, spec: ProposalSpec) -> ProposalRecord {
        self.store.create(spec, Utc::now()).expect("create proposal")
    }

    pub fn reload(&self, slug: &str) -> ProposalRecord {
        self.store.find(slug).expect("proposal exists")
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::load_or_default(self.root()).expect("readable manifest")
    }
}

pub fn clock_spec() -> ProposalSpec {
    ProposalSpec {
        id: "9b2f1c4e-clock".to_string(),
        slug: "clock".to_string(),
        name: "Clock".to_string(),
        description: "Tells the current time".to_string(),
        capabilities: vec!["user:output".to_string()],
        rationale: "Users keep asking what time it is".to_string(),
        ..ProposalSpec::default()
    }
}

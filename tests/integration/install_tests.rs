use std::path::Path;

use chrono::Utc;

use skillgate::SgError;
use skillgate::pipeline::{CLI_ACTOR, GatePolicy, Installer, PackageWriter, Status};
use skillgate::security::Sandbox;
use skillgate::storage::ProposalRecord;

use crate::fixture::{CLOCK_SOURCE, PipelineFixture, clock_spec};

/// Put the clock proposal in human-review with its implementation on disk.
fn awaiting_review(fixture: &PipelineFixture) -> ProposalRecord {
    let mut record = fixture.propose(clock_spec());
    fixture
        .store
        .sandbox()
        .write(fixture.store.implementation_path("clock"), CLOCK_SOURCE)
        .unwrap();
    record.set_status(Status::HumanReview, "admin-service", None, Utc::now());
    fixture.store.save(&record).unwrap();
    record
}

#[test]
fn operator_approval_installs_and_records_actor() {
    let fixture = PipelineFixture::new(false);
    let record = awaiting_review(&fixture);
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());

    let message = orchestrator.approve("clock", false).unwrap();
    assert_eq!(message, format!("Approved: clock ({})", record.id()));

    let stored = fixture.reload(record.id());
    assert_eq!(stored.status, Status::Accepted);
    assert_eq!(stored.history.last().unwrap().actor, CLI_ACTOR);
    assert!(fixture.manifest().contains_module("skills.clock"));

    let init = std::fs::read_to_string(fixture.path("skills/clock/__init__.py")).unwrap();
    assert!(init.contains("from skills.clock.skill import ClockSkill"));
}

#[test]
fn approval_outside_human_review_needs_force() {
    let fixture = PipelineFixture::new(false);
    let mut record = awaiting_review(&fixture);
    record.set_status(Status::AgentReview, "admin-service", None, Utc::now());
    fixture.store.save(&record).unwrap();
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());

    let err = orchestrator.approve("clock", false).unwrap_err();
    assert!(matches!(err, SgError::NotAwaitingApproval { .. }));
    assert_eq!(
        err.to_string(),
        "Proposal 'clock' is in status 'agent-review', not 'human-review'. Use --force to override."
    );
    assert!(!fixture.path("skills/clock").exists());

    orchestrator.approve("clock", true).unwrap();
    assert_eq!(fixture.reload("clock").status, Status::Accepted);
}

#[test]
fn remove_uninstalls_accepted_skill() {
    let fixture = PipelineFixture::new(false);
    awaiting_review(&fixture);
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());
    orchestrator.approve("clock", false).unwrap();

    let message = orchestrator.remove("clock").unwrap();
    assert!(message.starts_with("Removed: clock"));
    assert_eq!(fixture.reload("clock").status, Status::Removed);
    assert!(!fixture.manifest().contains_module("skills.clock"));
    assert!(!fixture.path("skills/clock").exists());

    let again = orchestrator.remove("clock").unwrap_err();
    assert!(matches!(again, SgError::InvalidState { .. }));
}

#[test]
fn remove_needs_accepted_status() {
    let fixture = PipelineFixture::new(false);
    awaiting_review(&fixture);
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());
    assert!(matches!(
        orchestrator.remove("clock"),
        Err(SgError::InvalidState { .. })
    ));
    assert_eq!(fixture.reload("clock").status, Status::HumanReview);
}

struct BrokenDisk;

impl PackageWriter for BrokenDisk {
    fn write_package(&self, sandbox: &Sandbox, dir: &Path, _source: &str, _init: &str) -> skillgate::Result<()> {
        sandbox.create_dir(dir)?;
        sandbox.write(dir.join("skill.py"), "partial")?;
        Err(SgError::Io(std::io::Error::other("disk full")))
    }
}

#[test]
fn failed_package_write_rolls_back_during_scan() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let installer = Installer::with_writer(fixture.store.sandbox().clone(), Box::new(BrokenDisk));
    let orchestrator = fixture
        .orchestrator(CLOCK_SOURCE, GatePolicy::all_auto())
        .with_installer(installer);

    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.failed, 1);

    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("InstallError"));
    assert!(record.rejection_reason.as_deref().unwrap().contains("disk full"));
    assert!(!fixture.manifest().contains_module("skills.clock"));
    assert!(!fixture.path("skills/clock").exists());
}

#[test]
fn corrupt_manifest_rejects_with_install_error() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    std::fs::create_dir_all(fixture.path("skills")).unwrap();
    std::fs::write(fixture.path("skills/manifest.yaml"), "skills: [unterminated\n").unwrap();
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::all_auto());

    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.failed, 1);

    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("InstallError"));
    assert!(!fixture.path("skills/clock").exists());
}

use skillgate::collab::Notice;
use skillgate::pipeline::{GateMode, GatePolicy, Status};
use skillgate::storage::ProposalSpec;

use crate::fixture::{CLOCK_SOURCE, PipelineFixture, clock_spec, subprocess_clock};

fn statuses(record: &skillgate::storage::ProposalRecord) -> Vec<Status> {
    record.history.iter().map(|h| h.status).collect()
}

#[test]
fn clock_is_accepted_in_one_pass() {
    let fixture = PipelineFixture::new(false);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::all_auto());

    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Accepted);
    assert_eq!(
        statuses(&record),
        [
            Status::Discovered,
            Status::Implementation,
            Status::AgentReview,
            Status::HumanReview,
            Status::Accepted,
        ]
    );
    assert!(record.history[1].note.as_deref().unwrap().starts_with("sha256:"));
    assert_eq!(record.history[2].note.as_deref(), Some("clean, 0 composition warning(s)"));

    let manifest = fixture.manifest();
    assert!(manifest.contains_module("skills.clock"));
    assert_eq!(manifest.skills[0].class, "ClockSkill");
    assert!(fixture.path("skills/clock/skill.py").is_file());
    assert!(fixture.path("proposals/_implementations/clock.py").is_file());
    assert!(fixture.approver.requests().is_empty());
}

#[test]
fn accepted_records_are_not_rescanned() {
    let fixture = PipelineFixture::new(false);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::all_auto());
    orchestrator.scan_once().unwrap();
    let before = fixture.reload("clock");

    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.processed, 0);
    assert_eq!(fixture.reload("clock"), before);
}

#[test]
fn forbidden_import_is_rejected_at_agent_review() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(&subprocess_clock(), GatePolicy::all_auto());

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("AnalysisError"));
    assert_eq!(
        record.rejection_reason.as_deref(),
        Some("Action failed: Analysis found critical issues: Forbidden import: 'subprocess' (line 1)")
    );
    assert_eq!(
        statuses(&record),
        [Status::Discovered, Status::Implementation, Status::Rejected]
    );
    assert!(!fixture.manifest().contains_module("skills.clock"));
    assert!(!fixture.path("skills/clock").exists());
}

#[test]
fn missing_fields_are_rejected_at_validation() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(ProposalSpec {
        id: "no-caps".to_string(),
        slug: "no-caps".to_string(),
        ..ProposalSpec::default()
    });
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::all_auto());

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("no-caps");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("ValidationError"));
    assert_eq!(
        record.rejection_reason.as_deref(),
        Some("Action failed: Missing required fields: name, description, capabilities")
    );
}

#[test]
fn infeasible_reason_is_kept() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(
        "INFEASIBLE: no real-time clock on this board",
        GatePolicy::all_auto(),
    );

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason_type.as_deref(), Some("GenerationError"));
    assert!(
        record
            .rejection_reason
            .as_deref()
            .unwrap()
            .ends_with("no real-time clock on this board")
    );
    assert!(!fixture.path("proposals/_implementations/clock.py").exists());
}

#[test]
fn human_review_gate_asks_and_installs_on_yes() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());

    orchestrator.scan_once().unwrap();
    assert_eq!(fixture.reload("clock").status, Status::Accepted);
    assert_eq!(
        fixture.approver.requests(),
        [("clock".to_string(), Status::HumanReview)]
    );
    let installed: Vec<Notice> = fixture
        .approver
        .notices()
        .into_iter()
        .filter(|n| n.message.contains("installed to"))
        .collect();
    assert_eq!(installed.len(), 1);
}

#[test]
fn human_review_denial_rejects_with_gate_tag() {
    let fixture = PipelineFixture::new(false);
    fixture.propose(clock_spec());
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::default());

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason.as_deref(), Some("Rejected at human-review gate"));
    assert_eq!(record.rejection_reason_type.as_deref(), Some("GateDenied"));
    assert!(!fixture.manifest().contains_module("skills.clock"));
}

#[test]
fn denied_install_gate_installs_nothing() {
    let fixture = PipelineFixture::new(false);
    fixture.propose(clock_spec());
    let mut gates = GatePolicy::all_auto();
    gates.set(Status::Accepted, GateMode::Human);
    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, gates);

    orchestrator.scan_once().unwrap();
    let record = fixture.reload("clock");
    assert_eq!(record.status, Status::Rejected);
    assert_eq!(record.rejection_reason.as_deref(), Some("Rejected at accepted gate"));
    assert!(!fixture.path("skills/clock").exists());
    assert!(!fixture.manifest().contains_module("skills.clock"));
}

#[test]
fn one_bad_record_does_not_stop_the_scan() {
    let fixture = PipelineFixture::new(true);
    fixture.propose(clock_spec());
    let mut other = clock_spec();
    other.id = "second".to_string();
    other.slug = "clock-two".to_string();
    fixture.propose(other);
    std::fs::create_dir_all(fixture.path("skills/clock")).unwrap();

    let orchestrator = fixture.orchestrator(CLOCK_SOURCE, GatePolicy::all_auto());
    let report = orchestrator.scan_once().unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);

    let failed = fixture.reload("clock");
    assert_eq!(failed.status, Status::Rejected);
    assert_eq!(failed.rejection_reason_type.as_deref(), Some("InstallError"));
    assert_eq!(fixture.reload("clock-two").status, Status::Accepted);
    assert!(fixture.manifest().contains_module("skills.clock_two"));
    assert!(!fixture.manifest().contains_module("skills.clock"));
}

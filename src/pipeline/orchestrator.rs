//! Drives proposals through the lifecycle and serves the administrative
//! operations (`list`, `approve`, `remove`).

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::analyzer::StaticAnalyzer;
use crate::collab::{ApprovalChannel, CodeGenerator, DisabledGenerator, SystemContext};
use crate::core::registry::SkillCatalog;
use crate::error::{Result, SgError};
use crate::pipeline::actions;
use crate::pipeline::gate::{GateMode, GatePolicy};
use crate::pipeline::install::Installer;
use crate::pipeline::status::Status;
use crate::pipeline::transition::{self, Approval, Outcome};
use crate::skills::{CORE_MODULES, builtin_catalog};
use crate::storage::{Manifest, ProposalRecord, ProposalStore};

/// History actor for transitions made by the polling pipeline.
pub const SERVICE_ACTOR: &str = "admin-service";
/// History actor for operator commands.
pub const CLI_ACTOR: &str = "admin-cli";

/// Counts from one pass over the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub processed: usize,
    pub failed: usize,
}

pub struct Orchestrator {
    store: ProposalStore,
    gates: GatePolicy,
    generator: Box<dyn CodeGenerator>,
    approver: Arc<dyn ApprovalChannel>,
    analyzer: StaticAnalyzer,
    installer: Installer,
    catalog: SkillCatalog,
    system: SystemContext,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: ProposalStore, approver: Arc<dyn ApprovalChannel>) -> Self {
        let installer = Installer::new(store.sandbox().clone());
        Self {
            store,
            gates: GatePolicy::default(),
            generator: Box::new(DisabledGenerator),
            approver,
            analyzer: StaticAnalyzer::default(),
            installer,
            catalog: builtin_catalog(),
            system: SystemContext::default(),
        }
    }

    #[must_use]
    pub const fn with_gates(mut self, gates: GatePolicy) -> Self {
        self.gates = gates;
        self
    }

    #[must_use]
    pub fn with_generator(mut self, generator: Box<dyn CodeGenerator>) -> Self {
        self.generator = generator;
        self
    }

    #[must_use]
    pub fn with_installer(mut self, installer: Installer) -> Self {
        self.installer = installer;
        self
    }

    #[must_use]
    pub fn with_system(mut self, system: SystemContext) -> Self {
        self.system = system;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &ProposalStore {
        &self.store
    }

    #[must_use]
    pub const fn gates(&self) -> &GatePolicy {
        &self.gates
    }

    /// Process every non-terminal record once. Per-record failures are logged.
    pub fn scan_once(&self) -> Result<ScanReport> {
        let mut report = ScanReport::default();
        for mut record in self.store.pending()? {
            report.processed += 1;
            if let Err(err) = self.process(&mut record) {
                report.failed += 1;
                error!(slug = record.slug(), error = %err, "failed to process proposal");
            }
        }
        Ok(report)
    }

    /// Advance one record as far as its gates allow.
    ///
    /// Errors are returned only for failures that must reach the operator
    /// (install and path violations) after the record has been rejected, or
    /// when the record cannot be persisted.
    pub fn process(&self, record: &mut ProposalRecord) -> Result<()> {
        if record.status.is_terminal() {
            return Ok(());
        }
        while let Some(target) = record.status.next() {
            if !self.step(record, target)? {
                break;
            }
        }
        Ok(())
    }

    /// One transition attempt. Returns whether the record advanced.
    fn step(&self, record: &mut ProposalRecord, target: Status) -> Result<bool> {
        let gate = self.gates.mode_for(target);
        let ask = |record: &ProposalRecord| {
            if self.approver.request_approval(record, target, &record.context) {
                Approval::Granted
            } else {
                Approval::Denied
            }
        };

        // Nothing is installed until a human install gate has said yes.
        let (action, approval) = if target == Status::Accepted && gate == GateMode::Human {
            match ask(record) {
                Approval::Denied => (Ok(None), Approval::Denied),
                granted => (self.run_action(record, target), granted),
            }
        } else {
            let action = self.run_action(record, target);
            let approval = match (&action, gate) {
                (Ok(_), GateMode::Human) => ask(record),
                _ => Approval::NotRequired,
            };
            (action, approval)
        };

        let outcome = transition::resolve(target, action.as_ref().cloned(), approval);
        transition::apply(record, &outcome, SERVICE_ACTOR, Utc::now());
        self.store.save(record)?;
        self.approver.notify(record, outcome.status(), &outcome.message());

        match &outcome {
            Outcome::Advance { target, .. } => {
                info!(slug = record.slug(), status = %target, "proposal transitioned");
            }
            Outcome::Reject { target, reason, tag } => {
                warn!(slug = record.slug(), %target, %tag, %reason, "proposal rejected");
            }
        }

        match action {
            Err(err) if err.is_fatal() => Err(err),
            _ => Ok(outcome.is_advance()),
        }
    }

    fn run_action(&self, record: &mut ProposalRecord, target: Status) -> Result<Option<String>> {
        match target {
            Status::Discovered => actions::validate(record),
            Status::Implementation => {
                actions::generate(record, self.generator.as_ref(), &self.system, &self.store)
            }
            Status::AgentReview => {
                let manifest = Manifest::load_or_default(self.store.sandbox().root())?;
                let active = actions::active_capabilities(&manifest, &self.catalog, &self.store)?;
                actions::analyze(record, &self.analyzer, &active, &self.store)
            }
            Status::Accepted => {
                let installed = self.installer.install(record, &self.store)?;
                self.approver.notify(record, Status::Accepted, &installed.message());
                Ok(None)
            }
            Status::HumanReview | Status::New | Status::Rejected | Status::Removed => Ok(None),
        }
    }

    pub fn list(&self, status: Option<Status>) -> Result<Vec<ProposalRecord>> {
        self.store.list(status)
    }

    /// Install a proposal on operator request.
    pub fn approve(&self, id_or_slug: &str, force: bool) -> Result<String> {
        let mut record = self.store.find(id_or_slug)?;
        if !force && record.status != Status::HumanReview {
            return Err(SgError::NotAwaitingApproval {
                slug: record.slug().to_string(),
                status: record.status.to_string(),
            });
        }

        let installed = self.installer.install(&record, &self.store)?;
        self.approver.notify(&record, Status::Accepted, &installed.message());
        record.set_status(Status::Accepted, CLI_ACTOR, None, Utc::now());
        self.store.save(&record)?;
        info!(slug = record.slug(), forced = force, "proposal approved by operator");
        Ok(format!("Approved: {} ({})", record.slug(), record.id()))
    }

    /// Uninstall an accepted, non-core skill.
    pub fn remove(&self, id_or_slug: &str) -> Result<String> {
        let mut record = self.store.find(id_or_slug)?;
        let module = record.proposal.module_name();
        if CORE_MODULES.contains(&module.as_str()) {
            return Err(SgError::CoreSkillProtected(record.slug().to_string()));
        }
        if record.status != Status::Accepted {
            return Err(SgError::InvalidState {
                slug: record.slug().to_string(),
                status: record.status.to_string(),
                expected: Status::Accepted.to_string(),
            });
        }

        self.installer.uninstall(&module)?;
        record.set_status(Status::Removed, CLI_ACTOR, None, Utc::now());
        self.store.save(&record)?;
        info!(slug = record.slug(), "skill removed by operator");
        Ok(format!("Removed: {} ({})", record.slug(), record.id()))
    }
}

/// The `ID | SLUG | CREATED_AT | STATUS` table.
#[must_use]
pub fn format_table(records: &[ProposalRecord]) -> String {
    if records.is_empty() {
        return "  No proposals found.".to_string();
    }

    let headers = ["ID", "SLUG", "CREATED_AT", "STATUS"];
    let rows: Vec<[String; 4]> = records
        .iter()
        .map(|record| {
            [
                record.id().to_string(),
                record.slug().to_string(),
                record.created_at(),
                record.status.to_string(),
            ]
        })
        .collect();

    let mut widths = headers.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: [&str; 4]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        format!("  {}", padded.join(" | "))
    };

    let mut lines = vec![format_row(headers)];
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(format!("  {}", rule.join("-+-")));
    for row in &rows {
        lines.push(format_row([&row[0], &row[1], &row[2], &row[3]]));
    }
    lines.join("\n")
}

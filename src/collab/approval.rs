//! Human notification and approval channels.

use std::io::{self, Write};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::warn;

use crate::pipeline::status::Status;
use crate::storage::{ProposalRecord, WorkingContext};

const SEPARATOR_WIDTH: usize = 60;
const MAX_LISTED_ISSUES: usize = 5;

pub trait ApprovalChannel: Send + Sync {
    /// Informational message about a proposal reaching `status`.
    fn notify(&self, record: &ProposalRecord, status: Status, message: &str);

    /// Ask whether `record` may enter `status`. Anything but a clear yes is a no.
    fn request_approval(&self, record: &ProposalRecord, status: Status, context: &WorkingContext) -> bool;
}

/// Terminal approver.
///
/// Answers come from the same line channel the polling loop reads commands
/// from, so a pending prompt and the command reader never race for stdin.
pub struct CliApprover {
    lines: Receiver<String>,
    out: Mutex<Box<dyn Write + Send>>,
}

impl CliApprover {
    #[must_use]
    pub fn new(lines: Receiver<String>) -> Self {
        Self::with_writer(lines, Box::new(io::stdout()))
    }

    #[must_use]
    pub fn with_writer(lines: Receiver<String>, out: Box<dyn Write + Send>) -> Self {
        Self {
            lines,
            out: Mutex::new(out),
        }
    }

    fn write_summary(out: &mut dyn Write, record: &ProposalRecord, status: Status, context: &WorkingContext) -> io::Result<()> {
        let spec = &record.proposal;
        let separator = "=".repeat(SEPARATOR_WIDTH);
        writeln!(out, "\n{separator}")?;
        writeln!(out, "  SKILL PROPOSAL: {}", record.display_name())?;
        writeln!(out, "{separator}")?;
        writeln!(out, "\n  Description: {}", spec.description)?;
        writeln!(out, "  Capabilities: {}", spec.capabilities.join(", "))?;
        if !spec.rationale.is_empty() {
            writeln!(out, "  Rationale: {}", spec.rationale)?;
        }
        if let Some(path) = &context.code_path {
            writeln!(out, "\n  Implementation: {}", path.display())?;
        }
        if let Some(analysis) = &context.analysis {
            if analysis.issues.is_empty() {
                writeln!(out, "\n  Analysis: CLEAN (no issues found)")?;
            } else {
                writeln!(out, "\n  Analysis: {} issue(s) found", analysis.issues.len())?;
                for issue in analysis.issues.iter().take(MAX_LISTED_ISSUES) {
                    writeln!(out, "    - {issue}")?;
                }
            }
            for warning in &analysis.warnings {
                writeln!(out, "    ! {warning}")?;
            }
        }
        writeln!(out, "\n  Status: {status}")?;
        writeln!(out, "\n  [A]pprove  [R]eject")?;
        writeln!(out, "{separator}")?;
        out.flush()
    }

    fn prompt(&self, out: &mut dyn Write) -> io::Result<bool> {
        loop {
            write!(out, "  > ")?;
            out.flush()?;
            let Ok(line) = self.lines.recv() else {
                writeln!(out, "\n  Rejected (interrupted)")?;
                return Ok(false);
            };
            match line.trim().to_lowercase().as_str() {
                "a" | "approve" | "y" | "yes" => return Ok(true),
                "r" | "reject" | "n" | "no" => return Ok(false),
                _ => writeln!(out, "  Please enter 'a' to approve or 'r' to reject.")?,
            }
        }
    }
}

impl ApprovalChannel for CliApprover {
    fn notify(&self, record: &ProposalRecord, status: Status, message: &str) {
        let mut out = self.out.lock();
        let tag = status.as_str().to_uppercase();
        if let Err(err) = writeln!(out, "\n  [{tag}] {}: {message}", record.display_name()) {
            warn!(error = %err, "failed to write notification");
        }
    }

    fn request_approval(&self, record: &ProposalRecord, status: Status, context: &WorkingContext) -> bool {
        let mut out = self.out.lock();
        let answer = Self::write_summary(&mut **out, record, status, context)
            .and_then(|()| self.prompt(&mut **out));
        match answer {
            Ok(approved) => approved,
            Err(err) => {
                warn!(error = %err, "approval prompt failed; rejecting");
                false
            }
        }
    }
}

/// A notification delivered to a [`FixedApprover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub slug: String,
    pub status: Status,
    pub message: String,
}

/// Answers every gate the same way and keeps the notifications it received.
#[derive(Debug, Default)]
pub struct FixedApprover {
    approve: bool,
    notices: Mutex<Vec<Notice>>,
    requests: Mutex<Vec<(String, Status)>>,
}

impl FixedApprover {
    #[must_use]
    pub fn approving() -> Self {
        Self {
            approve: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn denying() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// `(slug, target)` for every approval request, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, Status)> {
        self.requests.lock().clone()
    }
}

impl ApprovalChannel for FixedApprover {
    fn notify(&self, record: &ProposalRecord, status: Status, message: &str) {
        self.notices.lock().push(Notice {
            slug: record.slug().to_string(),
            status,
            message: message.to_string(),
        });
    }

    fn request_approval(&self, record: &ProposalRecord, status: Status, _context: &WorkingContext) -> bool {
        self.requests.lock().push((record.slug().to_string(), status));
        self.approve
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analyzer::{AnalysisResult, SafetyIssue};
    use crate::storage::ProposalSpec;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn record() -> ProposalRecord {
        ProposalRecord::new(ProposalSpec {
            slug: "clock".into(),
            name: "Clock".into(),
            description: "Tells the time".into(),
            capabilities: vec!["time:read".into()],
            ..ProposalSpec::default()
        })
    }

    fn scripted(answers: &[&str]) -> (CliApprover, SharedBuf) {
        let (tx, rx) = crossbeam_channel::unbounded();
        for answer in answers {
            tx.send((*answer).to_string()).unwrap();
        }
        drop(tx);
        let buf = SharedBuf::default();
        (CliApprover::with_writer(rx, Box::new(buf.clone())), buf)
    }

    #[test]
    fn approves_after_reprompt() {
        let (approver, buf) = scripted(&["maybe", " YES "]);
        assert!(approver.request_approval(&record(), Status::Accepted, &WorkingContext::default()));
        let text = buf.text();
        assert!(text.contains("  SKILL PROPOSAL: Clock"));
        assert!(text.contains("  Capabilities: time:read"));
        assert!(text.contains("  Status: accepted"));
        assert!(text.contains("Please enter 'a' to approve or 'r' to reject."));
    }

    #[test]
    fn rejects_on_no_and_on_end_of_input() {
        let (rejecting, _) = scripted(&["r"]);
        assert!(!rejecting.request_approval(&record(), Status::HumanReview, &WorkingContext::default()));

        let (interrupted, buf) = scripted(&[]);
        assert!(!interrupted.request_approval(&record(), Status::HumanReview, &WorkingContext::default()));
        assert!(buf.text().contains("Rejected (interrupted)"));
    }

    #[test]
    fn summary_lists_analysis() {
        let (approver, buf) = scripted(&["a"]);
        let context = WorkingContext {
            code_path: Some("proposals/_implementations/clock.py".into()),
            analysis: Some(AnalysisResult {
                clean: false,
                issues: vec![SafetyIssue::ForbiddenImport {
                    module: "os".into(),
                    line: 1,
                }],
                warnings: Vec::new(),
            }),
        };
        assert!(approver.request_approval(&record(), Status::Accepted, &context));
        let text = buf.text();
        assert!(text.contains("  Implementation: proposals/_implementations/clock.py"));
        assert!(text.contains("  Analysis: 1 issue(s) found"));
        assert!(text.contains("    - Forbidden import: 'os' (line 1)"));
    }

    #[test]
    fn notify_prints_uppercase_status() {
        let (approver, buf) = scripted(&[]);
        approver.notify(&record(), Status::AgentReview, "Transitioned to agent-review");
        assert_eq!(buf.text(), "\n  [AGENT-REVIEW] Clock: Transitioned to agent-review\n");
    }

    #[test]
    fn fixed_approver_records_calls() {
        let approver = FixedApprover::denying();
        assert!(!approver.request_approval(&record(), Status::Accepted, &WorkingContext::default()));
        approver.notify(&record(), Status::Rejected, "no");
        assert_eq!(approver.requests(), [("clock".to_string(), Status::Accepted)]);
        assert_eq!(approver.notices()[0].message, "no");
    }
}

//! A single status transition, split into a pure decision and its application.

use chrono::{DateTime, Utc};

use crate::error::SgError;
use crate::pipeline::status::Status;
use crate::storage::ProposalRecord;

pub const GATE_DENIED_TAG: &str = "GateDenied";

/// What the gate said about a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Automatic gate, or the action already failed.
    NotRequired,
    Granted,
    Denied,
}

/// The decided result of attempting to enter `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Advance {
        target: Status,
        note: Option<String>,
    },
    Reject {
        target: Status,
        reason: String,
        tag: String,
    },
}

impl Outcome {
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Advance { target, .. } => *target,
            Self::Reject { .. } => Status::Rejected,
        }
    }

    #[must_use]
    pub const fn is_advance(&self) -> bool {
        matches!(self, Self::Advance { .. })
    }

    /// Message for the approval channel.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Advance { target, .. } => format!("Transitioned to {target}"),
            Self::Reject { reason, .. } => reason.clone(),
        }
    }
}

/// Decide a transition. An action failure wins over the gate, which is
/// never consulted in that case.
#[must_use]
pub fn resolve(
    target: Status,
    action: std::result::Result<Option<String>, &SgError>,
    approval: Approval,
) -> Outcome {
    match action {
        Err(err) => Outcome::Reject {
            target,
            reason: format!("Action failed: {err}"),
            tag: err.rejection_tag().to_string(),
        },
        Ok(_) if approval == Approval::Denied => Outcome::Reject {
            target,
            reason: format!("Rejected at {target} gate"),
            tag: GATE_DENIED_TAG.to_string(),
        },
        Ok(note) => Outcome::Advance { target, note },
    }
}

/// Write an outcome into the record: status, history and rejection fields.
pub fn apply(record: &mut ProposalRecord, outcome: &Outcome, actor: &str, now: DateTime<Utc>) {
    match outcome {
        Outcome::Advance { target, note } => {
            record.set_status(*target, actor, note.clone(), now);
        }
        Outcome::Reject { reason, tag, .. } => {
            record.rejection_reason = Some(reason.clone());
            record.rejection_reason_type = Some(tag.clone());
            record.set_status(Status::Rejected, actor, None, now);
        }
    }
}

//! Proposal lifecycle statuses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SgError;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    New,
    Discovered,
    Implementation,
    AgentReview,
    HumanReview,
    Accepted,
    Rejected,
    Removed,
}

impl Status {
    pub const ALL: [Self; 8] = [
        Self::New,
        Self::Discovered,
        Self::Implementation,
        Self::AgentReview,
        Self::HumanReview,
        Self::Accepted,
        Self::Rejected,
        Self::Removed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Discovered => "discovered",
            Self::Implementation => "implementation",
            Self::AgentReview => "agent-review",
            Self::HumanReview => "human-review",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Removed => "removed",
        }
    }

    /// The forward step the orchestrator attempts from this status.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::New => Some(Self::Discovered),
            Self::Discovered => Some(Self::Implementation),
            Self::Implementation => Some(Self::AgentReview),
            Self::AgentReview => Some(Self::HumanReview),
            Self::HumanReview => Some(Self::Accepted),
            Self::Accepted | Self::Rejected | Self::Removed => None,
        }
    }

    /// Statuses the scan never touches again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::Removed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = SgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| SgError::Validation(format!("Unknown proposal status '{s}'")))
    }
}

//! Per-transition gate policy: proceed automatically or ask a human.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pipeline::status::Status;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    #[default]
    Auto,
    Human,
}

impl fmt::Display for GateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Human => "human",
        })
    }
}

/// Gate mode for each target status of the forward chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    #[serde(default)]
    pub discovered: GateMode,
    #[serde(default)]
    pub implementation: GateMode,
    #[serde(default, rename = "agent-review")]
    pub agent_review: GateMode,
    #[serde(default = "human", rename = "human-review")]
    pub human_review: GateMode,
    #[serde(default)]
    pub accepted: GateMode,
}

const fn human() -> GateMode {
    GateMode::Human
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            discovered: GateMode::Auto,
            implementation: GateMode::Auto,
            agent_review: GateMode::Auto,
            human_review: GateMode::Human,
            accepted: GateMode::Auto,
        }
    }
}

impl GatePolicy {
    /// Every transition automatic; used by tests and unattended runs.
    #[must_use]
    pub const fn all_auto() -> Self {
        Self {
            discovered: GateMode::Auto,
            implementation: GateMode::Auto,
            agent_review: GateMode::Auto,
            human_review: GateMode::Auto,
            accepted: GateMode::Auto,
        }
    }

    /// Mode for entering `target`. Targets outside the chain are automatic.
    #[must_use]
    pub const fn mode_for(&self, target: Status) -> GateMode {
        match target {
            Status::Discovered => self.discovered,
            Status::Implementation => self.implementation,
            Status::AgentReview => self.agent_review,
            Status::HumanReview => self.human_review,
            Status::Accepted => self.accepted,
            Status::New | Status::Rejected | Status::Removed => GateMode::Auto,
        }
    }

    pub fn set(&mut self, target: Status, mode: GateMode) {
        match target {
            Status::Discovered => self.discovered = mode,
            Status::Implementation => self.implementation = mode,
            Status::AgentReview => self.agent_review = mode,
            Status::HumanReview => self.human_review = mode,
            Status::Accepted => self.accepted = mode,
            Status::New | Status::Rejected | Status::Removed => {}
        }
    }
}

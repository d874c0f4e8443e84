//! Proposal records as persisted under `proposals/`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analyzer::AnalysisResult;
use crate::pipeline::status::Status;

/// A tool the proposed skill should expose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

/// The capability request an agent submits.
///
/// Keys not modelled here (`generated_at`, `profile_id`, `requirements`, ...)
/// are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposalSpec {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub dependencies: Vec<String>,
    pub handles_events: Vec<String>,
    pub tools: Vec<ToolSpec>,
    pub rationale: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ProposalSpec {
    /// Python module name derived from the slug.
    #[must_use]
    pub fn module_name(&self) -> String {
        self.slug.replace('-', "_")
    }

    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_yaml::Value::as_str)
    }

    /// Required fields that are absent or empty, in declaration order.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            ("id", self.id.trim().is_empty()),
            ("slug", self.slug.trim().is_empty()),
            ("name", self.name.trim().is_empty()),
            ("description", self.description.trim().is_empty()),
            ("capabilities", self.capabilities.is_empty()),
        ]
        .into_iter()
        .filter_map(|(field, missing)| missing.then_some(field))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: Status,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Per-run scratch data. Never written to disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingContext {
    pub code_path: Option<PathBuf>,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub proposal: ProposalSpec,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason_type: Option<String>,
    #[serde(skip)]
    pub context: WorkingContext,
    /// File the record was loaded from, relative to the data root.
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

impl ProposalRecord {
    #[must_use]
    pub fn new(proposal: ProposalSpec) -> Self {
        Self {
            proposal,
            status: Status::New,
            history: Vec::new(),
            rejection_reason: None,
            rejection_reason_type: None,
            context: WorkingContext::default(),
            location: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.proposal.id
    }

    #[must_use]
    pub fn slug(&self) -> &str {
        &self.proposal.slug
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.proposal.name.is_empty() {
            "unknown"
        } else {
            &self.proposal.name
        }
    }

    #[must_use]
    pub fn matches(&self, id_or_slug: &str) -> bool {
        !id_or_slug.is_empty() && (self.proposal.id == id_or_slug || self.proposal.slug == id_or_slug)
    }

    /// `generated_at`, cut before fractional seconds or a UTC offset.
    #[must_use]
    pub fn created_at(&self) -> String {
        let raw = self.proposal.extra_str("generated_at").unwrap_or_default();
        if let Some((head, _)) = raw.split_once('.') {
            head.to_string()
        } else if let Some((head, _)) = raw.split_once('+') {
            head.to_string()
        } else {
            raw.to_string()
        }
    }

    pub fn push_history(
        &mut self,
        status: Status,
        actor: &str,
        note: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            timestamp: now,
            status,
            actor: actor.to_string(),
            note,
        });
    }

    /// Status change with its history entry.
    pub fn set_status(&mut self, status: Status, actor: &str, note: Option<String>, now: DateTime<Utc>) {
        self.status = status;
        self.push_history(status, actor, note, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r"
proposal:
  id: 6f1c1f9e-0000-4000-8000-000000000001
  slug: clock
  name: Clock
  description: Tells the time
  capabilities: [time:read]
  generated_at: '2026-01-05T10:11:12.123456+00:00'
  profile_id: default
status: human-review
history:
  - timestamp: 2026-01-05T10:11:13Z
    status: discovered
    actor: admin-service
";

    #[test]
    fn parses_and_preserves_extra_keys() {
        let record: ProposalRecord = serde_yaml::from_str(RECORD).unwrap();
        assert_eq!(record.status, Status::HumanReview);
        assert_eq!(record.proposal.capabilities, ["time:read"]);
        assert_eq!(record.proposal.extra_str("profile_id"), Some("default"));
        assert_eq!(record.created_at(), "2026-01-05T10:11:12");

        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("profile_id: default"));
        assert!(!yaml.contains("rejection_reason"));
        assert!(!yaml.contains("code_path"));
    }

    #[test]
    fn created_at_cuts_offset_without_fraction() {
        let mut record = ProposalRecord::new(ProposalSpec::default());
        record
            .proposal
            .extra
            .insert("generated_at".into(), "2026-01-05T10:11:12+00:00".into());
        assert_eq!(record.created_at(), "2026-01-05T10:11:12");
    }

    #[test]
    fn missing_required_lists_empty_fields_in_order() {
        let spec = ProposalSpec {
            id: "x".into(),
            name: "X".into(),
            ..ProposalSpec::default()
        };
        assert_eq!(spec.missing_required(), ["slug", "description", "capabilities"]);
    }

    #[test]
    fn matches_by_id_or_slug() {
        let record = ProposalRecord::new(ProposalSpec {
            id: "abc".into(),
            slug: "weather-service".into(),
            ..ProposalSpec::default()
        });
        assert!(record.matches("abc"));
        assert!(record.matches("weather-service"));
        assert!(!record.matches("weather"));
        assert!(!record.matches(""));
        assert_eq!(record.proposal.module_name(), "weather_service");
    }

    #[test]
    fn set_status_appends_history() {
        let mut record = ProposalRecord::new(ProposalSpec::default());
        record.set_status(Status::Discovered, "admin-service", None, Utc::now());
        assert_eq!(record.status, Status::Discovered);
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.history[0].actor, "admin-service");
    }
}

//! Per-profile memory: an append-only JSONL log with keyword retrieval.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::core::capability::{self, CapabilitySet, MEMORY_READ, MEMORY_WRITE};
use crate::core::event::{Event, MEMORY_QUERY, MEMORY_STORE, SkillResult};
use crate::core::kernel::KernelContext;
use crate::core::skill::Skill;
use crate::error::Result;
use crate::security::{Sandbox, validate_identifier};

pub const DEFAULT_TOP_K: usize = 5;
const MIN_KEYWORD_LEN: usize = 3;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "your", "with", "this", "that", "have",
    "from", "was", "were", "what", "when", "where", "which", "who", "how", "can", "could",
    "would", "should", "about", "into", "there", "their", "they", "them", "then", "than", "its",
    "our", "out", "all", "any", "just", "also", "please", "like", "some",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Lowercase content words worth matching on, deduplicated and sorted.
#[must_use]
pub fn keywords(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN && !STOPWORDS.contains(&word.as_str()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Root-relative log path for a profile.
pub fn entries_path(profile_id: &str) -> Result<PathBuf> {
    validate_identifier(profile_id)?;
    Ok(Path::new("profiles")
        .join(profile_id)
        .join("memory")
        .join("entries.jsonl"))
}

/// Read a profile's entries. Malformed lines are skipped.
pub fn load_entries(root: &Path, profile_id: &str) -> Result<Vec<MemoryEntry>> {
    let path = root.join(entries_path(profile_id)?);
    let Ok(text) = fs::read_to_string(&path) else {
        return Ok(Vec::new());
    };
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping malformed memory line");
                None
            }
        })
        .collect())
}

pub fn append_entry(sandbox: &Sandbox, profile_id: &str, entry: &MemoryEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    sandbox.append(entries_path(profile_id)?, line)?;
    Ok(())
}

/// Entries sharing the most keywords with `query`, best first. Ties keep the
/// newer entry first.
#[must_use]
pub fn retrieve<'a>(entries: &'a [MemoryEntry], query: &str, top_k: usize) -> Vec<&'a MemoryEntry> {
    let wanted: BTreeSet<String> = keywords(query).into_iter().collect();
    if wanted.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<(usize, usize, &MemoryEntry)> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let score = entry.keywords.iter().filter(|k| wanted.contains(*k)).count();
            (score > 0).then_some((score, index, entry))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    scored.into_iter().take(top_k).map(|(_, _, entry)| entry).collect()
}

#[derive(Debug, Clone)]
pub struct MemorySkill {
    top_k: usize,
}

impl Default for MemorySkill {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K }
    }
}

impl MemorySkill {
    fn query(&self, event: &Event, ctx: &KernelContext) -> Result<SkillResult> {
        let entries = load_entries(ctx.sandbox().root(), &event.profile_id)?;
        let hits = retrieve(&entries, &event.payload, self.top_k);
        let context = hits
            .iter()
            .map(|entry| format!("- {}", entry.content))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(SkillResult::ok(context.clone()).with_data(json!({
            "memory_context": context,
            "matches": hits.len(),
        })))
    }

    fn store(event: &Event, ctx: &KernelContext) -> Result<SkillResult> {
        let content = event.payload.trim();
        if content.is_empty() {
            return Ok(SkillResult::ok("Stored 0 memory entries").with_data(json!({ "stored_count": 0 })));
        }
        let entry = MemoryEntry {
            timestamp: Utc::now(),
            session_id: event.session_id.clone(),
            content: content.to_string(),
            response: event
                .metadata
                .get("assistant_response")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            keywords: keywords(content),
        };
        append_entry(ctx.sandbox(), &event.profile_id, &entry)?;
        Ok(SkillResult::ok("Stored 1 memory entries").with_data(json!({ "stored_count": 1 })))
    }
}

impl Skill for MemorySkill {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Remember facts and preferences about the user."
    }

    fn capabilities(&self) -> CapabilitySet {
        capability::capability_set([MEMORY_READ, MEMORY_WRITE]).unwrap_or_default()
    }

    fn handles_events(&self) -> &[&'static str] {
        &[MEMORY_QUERY, MEMORY_STORE]
    }

    fn handle(&self, event: &Event, ctx: &KernelContext) -> Result<Option<SkillResult>> {
        let result = match event.event_type.as_str() {
            MEMORY_QUERY => self.query(event, ctx),
            MEMORY_STORE => Self::store(event, ctx),
            _ => return Ok(None),
        };
        match result {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                warn!(profile = %event.profile_id, error = %err, "memory operation failed");
                Ok(Some(SkillResult::failed(format!("Memory error: {err}"))))
            }
        }
    }
}

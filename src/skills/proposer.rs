//! Turns a capability request into a `new` proposal record.
//!
//! The proposer never writes code. It records what is wanted and why; the
//! pipeline decides whether it is ever built.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::capability::{self, CapabilitySet, FILE_WRITE, LLM_CALL};
use crate::core::event::{Event, SKILL_PROPOSAL, SkillResult};
use crate::core::kernel::KernelContext;
use crate::core::skill::Skill;
use crate::error::Result;
use crate::pipeline::status::Status;
use crate::security::Sandbox;
use crate::storage::{ProposalRecord, ProposalSpec, ProposalStore};

pub const PROPOSER_NAME: &str = "skill-proposer";

const MAX_SLUG_LEN: usize = 50;
const MAX_SLUG_WORDS: usize = 4;

static DISALLOWED_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s_-]").expect("valid slug filter regex"));
static SLUG_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_-]+").expect("valid slug separator regex"));

/// Keyword hints used when a request arrives as free text.
const CAPABILITY_HINTS: &[(&str, &[&str])] = &[
    ("network:read", &["http", "web", "api", "fetch", "download", "weather", "news", "url", "website"]),
    ("network:write", &["upload", "post", "webhook", "send"]),
    ("memory:read", &["recall", "remember", "memory"]),
    ("audio:read", &["listen", "microphone", "record"]),
    ("audio:write", &["speak", "audio", "sound", "play", "music"]),
    ("gpio:read", &["sensor", "button"]),
    ("gpio:write", &["gpio", "led", "relay", "pin"]),
    ("file:write", &["file", "save", "export"]),
];

/// Kebab-case slug from a free-form name: at most four words and fifty
/// characters, `unnamed` when nothing usable is left.
#[must_use]
pub fn sanitize_slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let filtered = DISALLOWED_SLUG_CHARS.replace_all(&lowered, "");
    let dashed = SLUG_SEPARATORS.replace_all(&filtered, "-");
    let words: Vec<&str> = dashed
        .trim_matches('-')
        .split('-')
        .take(MAX_SLUG_WORDS)
        .collect();
    let slug: String = words.join("-").chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug.to_string()
    }
}

/// The JSON object embedded in `text`, after stripping a code fence.
#[must_use]
pub fn parse_spec(text: &str) -> Option<serde_json::Map<String, Value>> {
    let text = crate::collab::clean_code(text);
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(err) => {
            warn!(error = %err, "proposal payload is not valid JSON; treating as text");
            None
        }
    }
}

/// Capability tokens suggested by words in a free-text request.
#[must_use]
pub fn infer_capabilities(request: &str) -> Vec<String> {
    let words: Vec<String> = request
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .collect();
    CAPABILITY_HINTS
        .iter()
        .filter(|(_, hints)| words.iter().any(|w| hints.contains(&w.as_str())))
        .map(|(token, _)| (*token).to_string())
        .collect()
}

/// Build the proposal spec for a request. Free text becomes the
/// description, with capabilities inferred from its words.
#[must_use]
pub fn build_spec(request: &str, profile_id: &str, now: DateTime<Utc>) -> ProposalSpec {
    let mut spec = match parse_spec(request) {
        Some(map) => serde_json::from_value::<ProposalSpec>(Value::Object(map)).unwrap_or_else(|err| {
            warn!(error = %err, "proposal payload has unexpected field types");
            ProposalSpec::default()
        }),
        None => ProposalSpec {
            description: request.trim().to_string(),
            capabilities: infer_capabilities(request),
            rationale: format!("Requested by the user: {}", request.trim()),
            ..ProposalSpec::default()
        },
    };

    if spec.name.trim().is_empty() {
        spec.name = sanitize_slug(request);
    }
    if spec.description.trim().is_empty() {
        spec.description = request.trim().to_string();
    }
    spec.id = uuid::Uuid::new_v4().to_string();
    spec.slug = sanitize_slug(&spec.name);
    let extras = [
        ("generated_by", PROPOSER_NAME.to_string()),
        ("generated_at", now.to_rfc3339()),
        ("profile_id", profile_id.to_string()),
        ("user_context", request.trim().to_string()),
    ];
    for (key, value) in extras {
        spec.extra.insert(key.to_string(), serde_yaml::Value::String(value));
    }
    spec
}

/// Write the proposal for `request` as a `new` record with its first
/// history entry attributed to `actor`.
pub fn write_proposal(
    sandbox: &Sandbox,
    request: &str,
    profile_id: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<ProposalRecord> {
    let spec = build_spec(request, profile_id, now);
    let store = ProposalStore::new(sandbox.clone());
    let mut record = store.create(spec, now)?;
    record.push_history(Status::New, actor, None, now);
    store.save(&record)?;
    Ok(record)
}

/// Whether the request itself flagged the skill as unlikely to work here.
#[must_use]
pub fn is_feasible(record: &ProposalRecord) -> bool {
    record
        .proposal
        .extra
        .get("feasible")
        .and_then(serde_yaml::Value::as_bool)
        .unwrap_or(true)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProposerSkill;

impl ProposerSkill {
    fn propose(event: &Event, ctx: &KernelContext) -> Result<SkillResult> {
        let record = write_proposal(ctx.sandbox(), &event.payload, &event.profile_id, PROPOSER_NAME, Utc::now())?;
        let feasible = is_feasible(&record);
        let name = record.display_name().to_string();

        let path = record
            .location
            .as_ref()
            .map(|p| ctx.sandbox().root().join(p))
            .unwrap_or_default();
        info!(slug = record.slug(), path = %path.display(), "skill proposal written");

        let note = if feasible { "" } else { " (NOTE: may not be feasible on this system)" };
        Ok(SkillResult::ok(format!(
            "Skill proposal '{name}' written to {}{note}. The admin service will review and implement it.",
            path.display()
        ))
        .with_data(json!({
            "path": path.display().to_string(),
            "id": record.id(),
            "slug": record.slug(),
            "feasible": feasible,
        })))
    }
}

impl Skill for ProposerSkill {
    fn name(&self) -> &str {
        PROPOSER_NAME
    }

    fn description(&self) -> &str {
        "Propose new skills for the agent. Produces structured proposals for admin review and never generates code."
    }

    fn capabilities(&self) -> CapabilitySet {
        capability::capability_set([LLM_CALL, FILE_WRITE]).unwrap_or_default()
    }

    fn handles_events(&self) -> &[&'static str] {
        &[SKILL_PROPOSAL]
    }

    fn trigger_phrases(&self) -> &[&'static str] {
        &["create a skill", "learn how to", "make a skill", "new skill", "add a skill"]
    }

    fn handle(&self, event: &Event, ctx: &KernelContext) -> Result<Option<SkillResult>> {
        if event.event_type != SKILL_PROPOSAL {
            return Ok(None);
        }
        match Self::propose(event, ctx) {
            Ok(result) => Ok(Some(result)),
            Err(err) => {
                warn!(error = %err, "proposal generation failed");
                Ok(Some(SkillResult::failed(format!(
                    "I couldn't generate a skill proposal: {err}"
                ))))
            }
        }
    }
}

//! Capability tokens and the event permission table.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SgError};

pub const USER_INPUT: &str = "user:input";
pub const USER_OUTPUT: &str = "user:output";
pub const MEMORY_READ: &str = "memory:read";
pub const MEMORY_WRITE: &str = "memory:write";
pub const LLM_CALL: &str = "llm:call";
pub const FILE_WRITE: &str = "file:write";
pub const AUDIO_READ: &str = "audio:read";
pub const AUDIO_WRITE: &str = "audio:write";
pub const GPIO_READ: &str = "gpio:read";
pub const GPIO_WRITE: &str = "gpio:write";
pub const NETWORK_READ: &str = "network:read";
pub const NETWORK_WRITE: &str = "network:write";

/// Tokens the runtime knows about. Other well-formed tokens are still accepted.
pub const STANDARD_VOCABULARY: &[&str] = &[
    USER_INPUT,
    USER_OUTPUT,
    MEMORY_READ,
    MEMORY_WRITE,
    LLM_CALL,
    FILE_WRITE,
    AUDIO_READ,
    AUDIO_WRITE,
    GPIO_READ,
    GPIO_WRITE,
    NETWORK_READ,
    NETWORK_WRITE,
];

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_-]+:[a-z0-9_-]+$").expect("valid token regex"));

/// A permission token of the form `domain:action`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Capability(String);

impl Capability {
    pub fn parse(token: &str) -> Result<Self> {
        let token = token.trim();
        if TOKEN_REGEX.is_match(token) {
            Ok(Self(token.to_string()))
        } else {
            Err(SgError::Validation(format!(
                "Invalid capability token '{token}' (expected domain:action)"
            )))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_standard(&self) -> bool {
        STANDARD_VOCABULARY.contains(&self.0.as_str())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Capability {
    type Error = SgError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.0
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

/// Parse a list of tokens into a set, failing on the first malformed one.
pub fn capability_set<I, S>(tokens: I) -> Result<CapabilitySet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokens
        .into_iter()
        .map(|token| Capability::parse(token.as_ref()))
        .collect()
}

/// Check whether a set contains a token given as a string.
#[must_use]
pub fn holds(set: &CapabilitySet, token: &str) -> bool {
    set.iter().any(|cap| cap.as_str() == token)
}

/// Maps event types to the token a source skill must hold to dispatch them.
///
/// Event types missing from the table are unrestricted.
#[derive(Debug, Clone)]
pub struct EventPolicy {
    required: BTreeMap<String, Capability>,
}

impl Default for EventPolicy {
    fn default() -> Self {
        let required = [
            ("user_input", USER_INPUT),
            ("user_output", USER_OUTPUT),
            ("memory_query", MEMORY_READ),
            ("memory_store", MEMORY_WRITE),
        ]
        .into_iter()
        .map(|(event, token)| (event.to_string(), Capability(token.to_string())))
        .collect();
        Self { required }
    }
}

impl EventPolicy {
    #[must_use]
    pub fn required_for(&self, event_type: &str) -> Option<&Capability> {
        self.required.get(event_type)
    }

    /// Add or replace the token required for an event type.
    #[must_use]
    pub fn with_requirement(mut self, event_type: &str, token: Capability) -> Self {
        self.required.insert(event_type.to_string(), token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_domain_action() {
        let cap = Capability::parse("memory:write").unwrap();
        assert_eq!(cap.as_str(), "memory:write");
        assert!(cap.is_standard());
        assert!(!Capability::parse("weather:read").unwrap().is_standard());
    }

    #[test]
    fn parse_rejects_malformed_tokens() {
        for token in ["", "memory", "memory:", ":write", "Memory:Write", "a:b:c", "a b:c"] {
            assert!(Capability::parse(token).is_err(), "{token:?} should be rejected");
        }
    }

    #[test]
    fn capability_set_dedupes_and_sorts() {
        let set = capability_set(["user:input", "llm:call", "user:input"]).unwrap();
        let tokens: Vec<_> = set.iter().map(Capability::as_str).collect();
        assert_eq!(tokens, ["llm:call", "user:input"]);
        assert!(holds(&set, "llm:call"));
        assert!(!holds(&set, "memory:read"));
    }

    #[test]
    fn default_policy_maps_restricted_events() {
        let policy = EventPolicy::default();
        assert_eq!(policy.required_for("memory_store").unwrap().as_str(), MEMORY_WRITE);
        assert_eq!(policy.required_for("user_input").unwrap().as_str(), USER_INPUT);
        assert!(policy.required_for("skill_proposal").is_none());
    }

    #[test]
    fn serde_validates_tokens() {
        let ok: Capability = serde_json::from_str("\"gpio:read\"").unwrap();
        assert_eq!(ok.as_str(), "gpio:read");
        assert!(serde_json::from_str::<Capability>("\"bogus\"").is_err());
    }
}

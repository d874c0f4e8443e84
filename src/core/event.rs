//! Events routed by the kernel and the results handlers return.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const USER_INPUT: &str = "user_input";
pub const USER_OUTPUT: &str = "user_output";
pub const MEMORY_QUERY: &str = "memory_query";
pub const MEMORY_STORE: &str = "memory_store";
pub const SKILL_PROPOSAL: &str = "skill_proposal";

/// An in-memory message between skills. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: String,
    /// Declared name of the dispatching skill.
    pub source: String,
    pub session_id: String,
    pub profile_id: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        payload: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
            source: source.into(),
            session_id: String::new(),
            profile_id: "default".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile_id: impl Into<String>) -> Self {
        self.profile_id = profile_id.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Derive a follow-up event that keeps this event's session and profile.
    #[must_use]
    pub fn follow_up(
        &self,
        event_type: impl Into<String>,
        payload: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload: payload.into(),
            source: source.into(),
            session_id: self.session_id.clone(),
            profile_id: self.profile_id.clone(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Outcome of handling an event or running a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl SkillResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

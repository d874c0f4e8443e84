//! The skill and tool interfaces the kernel drives.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::core::capability::CapabilitySet;
use crate::core::event::{Event, SkillResult};
use crate::core::kernel::KernelContext;
use crate::error::{Result, SgError};

/// A callable exposed to the language model through function-calling.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, args: &Value) -> Result<String>;
}

/// A capability-tagged unit loaded into the kernel.
///
/// Instances are shared across threads once the registry is frozen, so any
/// per-session state must sit behind interior mutability.
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    fn capabilities(&self) -> CapabilitySet;

    /// Event types this skill wants to receive.
    fn handles_events(&self) -> &[&'static str] {
        &[]
    }

    fn dependencies(&self) -> &[&'static str] {
        &[]
    }

    fn trigger_phrases(&self) -> &[&'static str] {
        &[]
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        Vec::new()
    }

    fn on_load(&self, _ctx: &KernelContext) -> Result<()> {
        Ok(())
    }

    /// Handle an event. `Ok(None)` lets the next handler try.
    fn handle(&self, _event: &Event, _ctx: &KernelContext) -> Result<Option<SkillResult>> {
        Ok(None)
    }

    /// Main loop of the interaction driver.
    fn run(&self, _ctx: &KernelContext) -> Result<()> {
        Err(SgError::Boot(format!(
            "skill '{}' cannot act as the interaction driver",
            self.name()
        )))
    }

    fn on_unload(&self, _ctx: &KernelContext) -> Result<()> {
        Ok(())
    }
}

/// Serializable snapshot of a skill's declared surface.
#[derive(Debug, Clone, Serialize)]
pub struct SkillInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub handles_events: Vec<String>,
    pub tools: Vec<String>,
}

impl SkillInfo {
    pub fn of(skill: &dyn Skill) -> Self {
        Self {
            name: skill.name().to_string(),
            description: skill.description().to_string(),
            version: skill.version().to_string(),
            capabilities: skill
                .capabilities()
                .iter()
                .map(ToString::to_string)
                .collect(),
            handles_events: skill
                .handles_events()
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            tools: skill.tools().iter().map(|t| t.name().to_string()).collect(),
        }
    }
}

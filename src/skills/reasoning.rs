//! Conversation handling for `user_input` events.
//!
//! A turn either routes to the skill whose trigger phrase it contains, or
//! is answered from memory. The turn is then stored in the background.

use serde_json::json;
use tracing::debug;

use crate::core::capability::{self, CapabilitySet, LLM_CALL, MEMORY_READ, MEMORY_WRITE};
use crate::core::event::{Event, MEMORY_QUERY, MEMORY_STORE, SkillResult, USER_INPUT};
use crate::core::kernel::KernelContext;
use crate::core::skill::Skill;
use crate::error::Result;

pub const REASONING_NAME: &str = "reasoning";

const NO_SKILL_REPLY: &str =
    "I can't do that yet. Say \"learn how to ...\" and I will propose a new skill for it.";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReasoningSkill;

impl ReasoningSkill {
    /// First other skill with a trigger phrase contained in `text`, and the
    /// event type to reach it with.
    fn route<'a>(text: &str, ctx: &'a KernelContext) -> Option<(&'a str, &'static str)> {
        let lowered = text.to_lowercase();
        ctx.registry().skills().iter().find_map(|skill| {
            if skill.name() == REASONING_NAME {
                return None;
            }
            let event_type = *skill.handles_events().first()?;
            skill
                .trigger_phrases()
                .iter()
                .any(|phrase| lowered.contains(phrase))
                .then_some((skill.name(), event_type))
        })
    }

    fn respond(event: &Event, ctx: &KernelContext) -> SkillResult {
        if let Some((skill, event_type)) = Self::route(&event.payload, ctx) {
            debug!(%skill, %event_type, "routing request by trigger phrase");
            let routed = event.follow_up(event_type, event.payload.clone(), REASONING_NAME);
            return match ctx.dispatch(&routed) {
                Some(result) => result,
                None => SkillResult::failed(format!("No skill handled the '{event_type}' request.")),
            };
        }

        let query = event.follow_up(MEMORY_QUERY, event.payload.clone(), REASONING_NAME);
        match ctx.dispatch(&query) {
            Some(result) if result.success && !result.output.trim().is_empty() => SkillResult::ok(format!(
                "Here is what I remember that may be relevant:\n{}",
                result.output
            )),
            _ => SkillResult::ok(NO_SKILL_REPLY),
        }
    }
}

impl Skill for ReasoningSkill {
    fn name(&self) -> &str {
        REASONING_NAME
    }

    fn description(&self) -> &str {
        "Processes user messages, consults memory and routes requests for new capabilities."
    }

    fn capabilities(&self) -> CapabilitySet {
        capability::capability_set([LLM_CALL, MEMORY_READ, MEMORY_WRITE]).unwrap_or_default()
    }

    fn handles_events(&self) -> &[&'static str] {
        &[USER_INPUT]
    }

    fn handle(&self, event: &Event, ctx: &KernelContext) -> Result<Option<SkillResult>> {
        if event.event_type != USER_INPUT {
            return Ok(None);
        }
        let result = Self::respond(event, ctx);

        let store = event
            .follow_up(MEMORY_STORE, event.payload.clone(), REASONING_NAME)
            .with_metadata("assistant_response", json!(result.output));
        ctx.spawn_background("memory-store", move |ctx| {
            ctx.dispatch(&store);
            Ok(())
        });

        Ok(Some(result))
    }
}

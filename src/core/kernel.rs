//! Capability-enforced event kernel.
//!
//! The kernel owns the frozen registry and hands skills a cheap
//! [`KernelContext`] handle for dispatching events, calling tools and
//! spawning background work.

use std::cell::Cell;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::background;
use crate::core::capability::EventPolicy;
use crate::core::event::{Event, SkillResult};
use crate::core::registry::SkillRegistry;
use crate::core::skill::Skill;
use crate::error::Result;
use crate::security::Sandbox;

pub const DEFAULT_MAX_DISPATCH_DEPTH: usize = 16;

thread_local! {
    static DISPATCH_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks nested dispatches on the current thread.
struct DepthGuard;

impl DepthGuard {
    fn enter(max: usize) -> Option<Self> {
        DISPATCH_DEPTH.with(|depth| {
            if depth.get() >= max {
                None
            } else {
                depth.set(depth.get() + 1);
                Some(Self)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DISPATCH_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub profile_id: String,
    pub max_dispatch_depth: usize,
    pub policy: EventPolicy,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            profile_id: "default".to_string(),
            max_dispatch_depth: DEFAULT_MAX_DISPATCH_DEPTH,
            policy: EventPolicy::default(),
        }
    }
}

struct Shared {
    registry: SkillRegistry,
    sandbox: Sandbox,
    settings: KernelSettings,
}

/// Handle given to skills for everything they may ask of the kernel.
#[derive(Clone)]
pub struct KernelContext {
    shared: Arc<Shared>,
}

impl KernelContext {
    /// Route an event to its handlers.
    ///
    /// Returns a failed result when the source lacks the required capability
    /// or the dispatch depth bound is hit, and `None` when no handler answered.
    pub fn dispatch(&self, event: &Event) -> Option<SkillResult> {
        let shared = &self.shared;

        if let Some(required) = shared.settings.policy.required_for(&event.event_type) {
            let permitted = shared
                .registry
                .get(&event.source)
                .is_some_and(|source| source.capabilities().contains(required));
            if !permitted {
                warn!(
                    source = %event.source,
                    event_type = %event.event_type,
                    capability = %required,
                    "dispatch denied"
                );
                return Some(SkillResult::failed(format!("Missing capability: {required}")));
            }
        }

        let max = shared.settings.max_dispatch_depth;
        let Some(_guard) = DepthGuard::enter(max) else {
            warn!(
                source = %event.source,
                event_type = %event.event_type,
                max_depth = max,
                "dispatch depth limit exceeded"
            );
            return Some(SkillResult::failed(format!(
                "Dispatch depth limit ({max}) exceeded for '{}'",
                event.event_type
            )));
        };

        for skill in shared.registry.handlers_for(&event.event_type) {
            if skill.name() == event.source {
                continue;
            }
            match skill.handle(event, self) {
                Ok(Some(result)) => return Some(result),
                Ok(None) => {}
                Err(err) => warn!(
                    skill = skill.name(),
                    event_type = %event.event_type,
                    error = %err,
                    "handler failed, trying next"
                ),
            }
        }

        debug!(event_type = %event.event_type, "no handler produced a result");
        None
    }

    /// Run a tool by name. Failures come back as text, never as errors.
    #[must_use]
    pub fn call_tool(&self, name: &str, args: &Value) -> String {
        match self.shared.registry.find_tool(name) {
            None => format!("Unknown tool: {name}"),
            Some(tool) => match tool.execute(args) {
                Ok(output) => output,
                Err(err) => {
                    warn!(tool = name, error = %err, "tool failed");
                    format!("Tool error: {err}")
                }
            },
        }
    }

    #[must_use]
    pub fn tool_schemas(&self) -> Vec<Value> {
        self.shared.registry.tool_schemas()
    }

    #[must_use]
    pub fn registry(&self) -> &SkillRegistry {
        &self.shared.registry
    }

    #[must_use]
    pub fn sandbox(&self) -> &Sandbox {
        &self.shared.sandbox
    }

    #[must_use]
    pub fn profile_id(&self) -> &str {
        &self.shared.settings.profile_id
    }

    /// Push a best-effort side effect onto a detached thread.
    pub fn spawn_background<F>(&self, name: &str, task: F)
    where
        F: FnOnce(Self) -> Result<()> + Send + 'static,
    {
        let ctx = self.clone();
        background::spawn_detached(name, move || task(ctx));
    }
}

/// A booted kernel: frozen registry, resolved driver, loaded skills.
pub struct Kernel {
    ctx: KernelContext,
    driver: Arc<dyn Skill>,
    unloaded: bool,
}

impl Kernel {
    /// Freeze the registry, find the driver and run every `on_load` hook.
    pub fn start(mut registry: SkillRegistry, sandbox: Sandbox, settings: KernelSettings) -> Result<Self> {
        registry.freeze();
        let driver = registry.find_driver()?;

        let ctx = KernelContext {
            shared: Arc::new(Shared {
                registry,
                sandbox,
                settings,
            }),
        };

        for skill in ctx.registry().skills() {
            if let Err(err) = skill.on_load(&ctx) {
                warn!(skill = skill.name(), error = %err, "on_load failed");
            }
        }

        info!(
            skills = ctx.registry().len(),
            driver = driver.name(),
            "kernel started"
        );
        Ok(Self {
            ctx,
            driver,
            unloaded: false,
        })
    }

    #[must_use]
    pub const fn context(&self) -> &KernelContext {
        &self.ctx
    }

    #[must_use]
    pub fn driver(&self) -> &Arc<dyn Skill> {
        &self.driver
    }

    pub fn dispatch(&self, event: &Event) -> Option<SkillResult> {
        self.ctx.dispatch(event)
    }

    /// Hand control to the driver, then unload all skills.
    pub fn run(mut self) -> Result<()> {
        let result = self.driver.run(&self.ctx);
        self.shutdown();
        result
    }

    pub fn shutdown(&mut self) {
        if self.unloaded {
            return;
        }
        self.unloaded = true;
        for skill in self.ctx.registry().skills() {
            if let Err(err) = skill.on_unload(&self.ctx) {
                warn!(skill = skill.name(), error = %err, "on_unload failed");
            }
        }
        info!("kernel stopped");
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capability::{Capability, CapabilitySet};
    use crate::core::skill::Tool;
    use crate::error::SgError;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    fn caps(tokens: &[&str]) -> CapabilitySet {
        tokens.iter().map(|t| Capability::parse(t).unwrap()).collect()
    }

    struct Driver;

    impl Skill for Driver {
        fn name(&self) -> &str {
            "driver"
        }
        fn description(&self) -> &str {
            "test driver"
        }
        fn capabilities(&self) -> CapabilitySet {
            caps(&["user:input", "memory:write"])
        }
    }

    struct Recorder {
        name: &'static str,
        answer: Option<&'static str>,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl Skill for Recorder {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records events"
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn handles_events(&self) -> &[&'static str] {
            &["memory_store", "ping"]
        }
        fn handle(&self, event: &Event, _ctx: &KernelContext) -> Result<Option<SkillResult>> {
            self.calls.lock().push(format!("{}:{}", self.name, event.event_type));
            if self.fail {
                return Err(SgError::NotFound("boom".into()));
            }
            Ok(self.answer.map(SkillResult::ok))
        }
    }

    struct Looper;

    impl Skill for Looper {
        fn name(&self) -> &str {
            "looper"
        }
        fn description(&self) -> &str {
            "re-dispatches its own event"
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn handles_events(&self) -> &[&'static str] {
            &["loop"]
        }
        fn handle(&self, event: &Event, ctx: &KernelContext) -> Result<Option<SkillResult>> {
            // Dispatch as someone else so the echo rule does not stop recursion.
            Ok(ctx.dispatch(&event.follow_up("loop", "", "driver")))
        }
    }

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn execute(&self, args: &Value) -> Result<String> {
            args.get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| SgError::Validation("missing text".into()))
        }
    }

    struct ToolSkill;

    impl Skill for ToolSkill {
        fn name(&self) -> &str {
            "tools"
        }
        fn description(&self) -> &str {
            "tool holder"
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::new()
        }
        fn tools(&self) -> Vec<Arc<dyn Tool>> {
            vec![Arc::new(Echo)]
        }
    }

    fn boot(extra: Vec<Arc<dyn Skill>>) -> (TempDir, Kernel) {
        let temp = TempDir::new().unwrap();
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(Driver)).unwrap();
        for skill in extra {
            registry.register(skill).unwrap();
        }
        let sandbox = Sandbox::agent(temp.path()).unwrap();
        let kernel = Kernel::start(registry, sandbox, KernelSettings::default()).unwrap();
        (temp, kernel)
    }

    fn recorder(
        name: &'static str,
        answer: Option<&'static str>,
        fail: bool,
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Skill> {
        Arc::new(Recorder {
            name,
            answer,
            fail,
            calls: Arc::clone(calls),
        })
    }

    #[test]
    fn denies_source_without_capability() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_temp, kernel) = boot(vec![recorder("store", Some("stored"), false, &calls)]);

        let result = kernel
            .dispatch(&Event::new("memory_store", "fact", "store"))
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Missing capability: memory:write");
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn denies_unregistered_source_for_restricted_event() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_temp, kernel) = boot(vec![recorder("store", Some("stored"), false, &calls)]);

        let result = kernel
            .dispatch(&Event::new("memory_store", "fact", "ghost"))
            .unwrap();
        assert!(!result.success);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn first_result_short_circuits_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_temp, kernel) = boot(vec![
            recorder("quiet", None, false, &calls),
            recorder("loud", Some("handled"), false, &calls),
            recorder("late", Some("too late"), false, &calls),
        ]);

        let result = kernel
            .dispatch(&Event::new("memory_store", "fact", "driver"))
            .unwrap();
        assert_eq!(result.output, "handled");
        assert_eq!(*calls.lock(), ["quiet:memory_store", "loud:memory_store"]);
    }

    #[test]
    fn failing_handler_is_skipped() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_temp, kernel) = boot(vec![
            recorder("broken", Some("never"), true, &calls),
            recorder("works", Some("ok"), false, &calls),
        ]);

        let result = kernel.dispatch(&Event::new("ping", "", "driver")).unwrap();
        assert_eq!(result.output, "ok");
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn source_does_not_receive_its_own_event() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_temp, kernel) = boot(vec![recorder("self", Some("echo"), false, &calls)]);

        assert!(kernel.dispatch(&Event::new("ping", "", "self")).is_none());
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn recursion_is_bounded() {
        let (_temp, kernel) = boot(vec![Arc::new(Looper)]);
        let result = kernel.dispatch(&Event::new("loop", "", "driver")).unwrap();
        assert!(!result.success);
        assert!(result.output.contains("depth limit"));
    }

    #[test]
    fn call_tool_reports_errors_as_text() {
        let (_temp, kernel) = boot(vec![Arc::new(ToolSkill)]);
        let ctx = kernel.context();

        assert_eq!(ctx.call_tool("echo", &serde_json::json!({ "text": "hi" })), "hi");
        assert_eq!(ctx.call_tool("nope", &Value::Null), "Unknown tool: nope");
        assert!(ctx.call_tool("echo", &Value::Null).starts_with("Tool error: "));

        let schemas = ctx.tool_schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0]["function"]["name"], "echo");
    }

    #[test]
    fn start_fails_without_driver() {
        let temp = TempDir::new().unwrap();
        let mut registry = SkillRegistry::new();
        registry.register(Arc::new(ToolSkill)).unwrap();
        let sandbox = Sandbox::agent(temp.path()).unwrap();
        assert!(matches!(
            Kernel::start(registry, sandbox, KernelSettings::default()),
            Err(SgError::Boot(_))
        ));
    }

    #[test]
    fn kernel_registry_is_frozen() {
        let (_temp, kernel) = boot(Vec::new());
        assert!(kernel.context().registry().is_frozen());
    }
}

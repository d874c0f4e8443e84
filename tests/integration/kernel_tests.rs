use std::io::{self, Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;

use skillgate::core::capability::{self, CapabilitySet};
use skillgate::core::event::{MEMORY_STORE, USER_INPUT};
use skillgate::core::{Event, Kernel, KernelContext, KernelSettings, Skill, SkillRegistry, SkillResult, Tool};
use skillgate::security::Sandbox;
use skillgate::skills::memory::{self, MemoryEntry};
use skillgate::skills::{CliSkill, MemorySkill, ProposerSkill, ReasoningSkill};
use skillgate::storage::ProposalStore;

// =============================================================================
// Test skills
// =============================================================================

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Driver-capable skill that records the memory writes it receives.
#[derive(Default)]
struct Recorder {
    stores: AtomicUsize,
}

impl Skill for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn description(&self) -> &str {
        "Counts memory_store events"
    }

    fn capabilities(&self) -> CapabilitySet {
        capability::capability_set(["user:input"]).unwrap()
    }

    fn handles_events(&self) -> &[&'static str] {
        &[MEMORY_STORE]
    }

    fn handle(&self, _event: &Event, _ctx: &KernelContext) -> skillgate::Result<Option<SkillResult>> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        Ok(Some(SkillResult::ok("stored")))
    }
}

/// Declares nothing.
struct Mute;

impl Skill for Mute {
    fn name(&self) -> &str {
        "mute"
    }

    fn description(&self) -> &str {
        "Holds no capabilities"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }
}

/// Answers `ping` by sending another `ping`.
struct Bouncer(&'static str);

impl Skill for Bouncer {
    fn name(&self) -> &str {
        self.0
    }

    fn description(&self) -> &str {
        "Re-dispatches every ping"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }

    fn handles_events(&self) -> &[&'static str] {
        &["ping"]
    }

    fn handle(&self, event: &Event, ctx: &KernelContext) -> skillgate::Result<Option<SkillResult>> {
        Ok(ctx.dispatch(&Event::new("ping", event.payload.clone(), self.0)))
    }
}

struct Echo;

impl Tool for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the text argument"
    }

    fn execute(&self, args: &serde_json::Value) -> skillgate::Result<String> {
        args["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| skillgate::SgError::Validation("text is required".to_string()))
    }
}

struct Toolbox;

impl Skill for Toolbox {
    fn name(&self) -> &str {
        "toolbox"
    }

    fn description(&self) -> &str {
        "Exposes the echo tool"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new()
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![Arc::new(Echo)]
    }
}

fn start(skills: Vec<Arc<dyn Skill>>, root: &TempDir, max_depth: usize) -> Kernel {
    let mut registry = SkillRegistry::new();
    for skill in skills {
        registry.register(skill).unwrap();
    }
    let settings = KernelSettings {
        max_dispatch_depth: max_depth,
        ..KernelSettings::default()
    };
    Kernel::start(registry, Sandbox::agent(root.path()).unwrap(), settings).unwrap()
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

// =============================================================================
// Capability enforcement
// =============================================================================

#[test]
fn capability_less_source_is_denied_and_no_handler_runs() {
    let temp = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let kernel = start(vec![recorder.clone(), Arc::new(Mute)], &temp, 16);

    let result = kernel
        .dispatch(&Event::new(MEMORY_STORE, "remember this", "mute"))
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.output, "Missing capability: memory:write");
    assert_eq!(recorder.stores.load(Ordering::SeqCst), 0);
}

#[test]
fn unregistered_source_is_denied() {
    let temp = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder::default());
    let kernel = start(vec![recorder.clone()], &temp, 16);

    let result = kernel
        .dispatch(&Event::new(MEMORY_STORE, "x", "stranger"))
        .unwrap();
    assert_eq!(result.output, "Missing capability: memory:write");
    assert_eq!(recorder.stores.load(Ordering::SeqCst), 0);
}

#[test]
fn unrestricted_events_route_past_the_source() {
    let temp = TempDir::new().unwrap();
    let kernel = start(
        vec![Arc::new(Recorder::default()), Arc::new(Bouncer("left")), Arc::new(Bouncer("right"))],
        &temp,
        4,
    );

    let result = kernel.dispatch(&Event::new("ping", "hi", "left")).unwrap();
    assert!(!result.success);
    assert_eq!(result.output, "Dispatch depth limit (4) exceeded for 'ping'");
}

#[test]
fn tools_report_failures_as_text() {
    let temp = TempDir::new().unwrap();
    let kernel = start(vec![Arc::new(Recorder::default()), Arc::new(Toolbox)], &temp, 16);
    let ctx = kernel.context();

    assert_eq!(ctx.call_tool("echo", &json!({ "text": "hello" })), "hello");
    assert_eq!(ctx.call_tool("echo", &json!({})), "Tool error: text is required");
    assert_eq!(ctx.call_tool("missing", &json!({})), "Unknown tool: missing");
    let schemas = ctx.tool_schemas();
    assert_eq!(schemas.len(), 1);
    assert_eq!(schemas[0]["function"]["name"], "echo");
}

// =============================================================================
// Core skills
// =============================================================================

fn core_skills(input: &str, out: &SharedBuf) -> Vec<Arc<dyn Skill>> {
    vec![
        Arc::new(CliSkill::with_io(
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(out.clone()),
        )),
        Arc::new(ReasoningSkill),
        Arc::new(MemorySkill::default()),
        Arc::new(ProposerSkill),
    ]
}

#[test]
fn learn_request_becomes_a_proposal() {
    let temp = TempDir::new().unwrap();
    let out = SharedBuf::default();
    let kernel = start(core_skills("learn how to fetch the weather\nquit\n", &out), &temp, 16);
    kernel.run().unwrap();

    let text = out.text();
    assert!(text.contains("Skill proposal 'learn-how-to-fetch' written to"));
    assert!(text.contains("Goodbye!"));

    let store = ProposalStore::new(Sandbox::admin(temp.path()).unwrap());
    let record = store.find("learn-how-to-fetch").unwrap();
    assert_eq!(record.proposal.capabilities, ["network:read"]);
    assert_eq!(record.proposal.extra_str("generated_by"), Some("skill-proposer"));
}

#[test]
fn reasoning_answers_from_memory_and_stores_turns() {
    let temp = TempDir::new().unwrap();
    let sandbox = Sandbox::agent(temp.path()).unwrap();
    memory::append_entry(
        &sandbox,
        "default",
        &MemoryEntry {
            timestamp: Utc::now(),
            session_id: String::new(),
            content: "I love green tea".to_string(),
            response: None,
            keywords: memory::keywords("I love green tea"),
        },
    )
    .unwrap();

    let out = SharedBuf::default();
    let kernel = start(core_skills("which tea do I prefer?\nexit\n", &out), &temp, 16);
    kernel.run().unwrap();

    let text = out.text();
    assert!(text.contains("Assistant: Here is what I remember that may be relevant:\n- I love green tea"));

    let root = sandbox.root().to_path_buf();
    assert!(wait_for(|| {
        memory::load_entries(&root, "default").map_or(false, |entries| entries.len() == 2)
    }));
    let entries = memory::load_entries(&root, "default").unwrap();
    assert_eq!(entries[1].content, "which tea do I prefer?");
    assert!(entries[1].response.as_deref().unwrap().contains("green tea"));
}

#[test]
fn user_input_from_the_driver_reaches_reasoning() {
    let temp = TempDir::new().unwrap();
    let out = SharedBuf::default();
    let kernel = start(core_skills("", &out), &temp, 16);

    let result = kernel
        .dispatch(&Event::new(USER_INPUT, "hello there", "cli"))
        .unwrap();
    assert!(result.success);
    assert!(result.output.contains("learn how to"));
}

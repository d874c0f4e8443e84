//! Code generation collaborators.
//!
//! A [`CodeGenerator`] turns a proposal spec into candidate Python source.
//! The pipeline only trusts what it can check afterwards, so generators are
//! free to be anything: an HTTP chat-completions endpoint, a local command,
//! or a test double.

use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::analyzer::SafetyPolicy;
use crate::config::{GeneratorConfig, GeneratorKind, SystemConfig};
use crate::error::{Result, SgError};
use crate::storage::ProposalSpec;

pub const INFEASIBLE_PREFIX: &str = "INFEASIBLE:";

const USER_AGENT: &str = "skillgate";

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```\w*\n?").expect("valid leading fence regex"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```$").expect("valid trailing fence regex"));

/// Host facts quoted in the generation prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemContext {
    pub platform: String,
    pub runtime_version: String,
    pub installed_packages: Vec<String>,
}

impl From<&SystemConfig> for SystemContext {
    fn from(config: &SystemConfig) -> Self {
        Self {
            platform: config.platform.clone(),
            runtime_version: config.runtime_version.clone(),
            installed_packages: config.installed_packages.clone(),
        }
    }
}

pub trait CodeGenerator: Send + Sync {
    /// Raw generator output for `spec`. Interpretation happens in [`interpret`].
    fn generate(&self, spec: &ProposalSpec, system: &SystemContext) -> Result<String>;
}

/// A generator's answer after the infeasible signal and fences are handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    Source(String),
    Infeasible(String),
}

#[must_use]
pub fn interpret(raw: &str) -> Generation {
    let trimmed = raw.trim();
    let prefix_len = INFEASIBLE_PREFIX.len();
    if trimmed.len() >= prefix_len
        && trimmed.is_char_boundary(prefix_len)
        && trimmed[..prefix_len].eq_ignore_ascii_case(INFEASIBLE_PREFIX)
    {
        return Generation::Infeasible(trimmed[prefix_len..].trim().to_string());
    }
    Generation::Source(clean_code(raw))
}

/// Strip surrounding whitespace and a markdown code fence, if any.
#[must_use]
pub fn clean_code(raw: &str) -> String {
    let text = raw.trim();
    if !text.starts_with("```") {
        return text.to_string();
    }
    let text = LEADING_FENCE.replace(text, "");
    let text = TRAILING_FENCE.replace(&text, "");
    text.trim().to_string()
}

/// The implementation prompt sent to model-backed generators.
#[must_use]
pub fn build_prompt(spec: &ProposalSpec, system: &SystemContext, policy: &SafetyPolicy) -> String {
    let allowed_packages: Vec<&str> = system
        .installed_packages
        .iter()
        .filter(|pkg| !policy.forbids_module(&pkg.to_lowercase().replace('-', "_")))
        .map(String::as_str)
        .collect();

    let tools = if spec.tools.is_empty() {
        "(none specified; infer appropriate tools from the description)".to_string()
    } else {
        serde_json::to_string_pretty(&spec.tools).unwrap_or_default()
    };

    let forbidden_modules: Vec<&str> = policy.forbidden_modules.iter().map(String::as_str).collect();
    let forbidden_builtins: Vec<&str> = policy.forbidden_builtins.iter().map(String::as_str).collect();
    let name = if spec.name.is_empty() { "unnamed" } else { &spec.name };
    let packages = allowed_packages.join(", ");

    format!(
        "Generate a complete Python skill module for the agent framework.

## Skill interface
The skill must subclass BaseSkill from skills.base.

Required overrides:
- name (property) -> str: unique skill identifier
- description (property) -> str: one-line description
- capabilities (property) -> frozenset[str]: declared capability tokens
- handles_events (property) -> list[str]: should be [] for tool-based skills
- handle(self, event, ctx) -> SkillResult | None: return None for tool-based skills
- tools (property) -> list[BaseTool]: tool instances this skill provides

Optional overrides: version, trigger_phrases, dependencies, on_load(ctx), on_unload().

## Tool interface
Each BaseTool subclass defines name, description, parameters_schema (JSON Schema
for its input) and execute(self, **kwargs) -> str.

## Types
- Event: type, payload, source, session_id, profile_id, metadata
- SkillResult: success, output, data

## System context
Runtime version: {runtime}
Installed packages: {packages}
Platform: {platform}

## Proposal spec
Name: {name}
Description: {description}
Capabilities: {capabilities}
Dependencies: {dependencies}
Handles events: {events}
Tools: {tools}
Rationale: {rationale}

## Rules
1. Only import from skills.base, skills.types and the standard library
2. Additional third-party imports are allowed ONLY from: {packages}
3. Do NOT import any of these modules (they are blocked by security policy): {modules}
4. Do NOT call any of these builtins: {builtins}
5. Write clean, well-structured Python 3.11+ code with error handling
6. The module must be self-contained
7. handle() MUST be synchronous
8. Do NOT handle \"user_input\" events; that is reserved for the reasoning skill
9. Expose all functionality through BaseTool subclasses with typed parameters_schema
10. Set handles_events to [] and have handle() return None

If the proposal is impossible to implement within these constraints, respond with \
ONLY a single line: {INFEASIBLE_PREFIX} <reason>

Otherwise, respond with ONLY the Python code (no markdown fences, no explanation).",
        runtime = system.runtime_version,
        platform = if system.platform.is_empty() { "unknown" } else { &system.platform },
        description = spec.description,
        capabilities = spec.capabilities.join(", "),
        dependencies = spec.dependencies.join(", "),
        events = spec.handles_events.join(", "),
        rationale = spec.rationale,
        modules = forbidden_modules.join(", "),
        builtins = forbidden_builtins.join(", "),
    )
}

/// Placeholder used when no generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGenerator;

impl CodeGenerator for DisabledGenerator {
    fn generate(&self, _spec: &ProposalSpec, _system: &SystemContext) -> Result<String> {
        Err(SgError::Generation("No code generator configured".to_string()))
    }
}

/// OpenAI-compatible chat-completions client.
pub struct HttpGenerator {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
    policy: SafetyPolicy,
}

impl HttpGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty());
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            policy: SafetyPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl CodeGenerator for HttpGenerator {
    fn generate(&self, spec: &ProposalSpec, system: &SystemContext) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(spec, system, &self.policy) }],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(endpoint = %self.endpoint, model = %self.model, "requesting implementation");
        let response = request.send().map_err(|err| {
            if err.is_timeout() {
                SgError::Timeout(format!("code generation request to {}", self.endpoint))
            } else {
                SgError::Generation(format!("request failed: {err}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(SgError::Generation(format!("HTTP {status}: {}", text.trim())));
        }

        let payload: Value = response
            .json()
            .map_err(|err| SgError::Generation(format!("invalid response body: {err}")))?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SgError::Generation("response has no message content".to_string()))?;
        info!(model = %self.model, bytes = content.len(), "implementation received");
        Ok(content.to_string())
    }
}

/// Runs a local program: prompt on stdin, source on stdout.
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
    policy: SafetyPolicy,
}

impl CommandGenerator {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Result<Self> {
        if argv.is_empty() {
            return Err(SgError::MissingConfig("generator.command".to_string()));
        }
        Ok(Self {
            argv,
            timeout,
            policy: SafetyPolicy::default(),
        })
    }
}

impl CodeGenerator for CommandGenerator {
    fn generate(&self, spec: &ProposalSpec, system: &SystemContext) -> Result<String> {
        let prompt = build_prompt(spec, system, &self.policy);
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| SgError::Generation(format!("failed to run {}: {err}", self.argv[0])))?;

        if let Some(mut stdin) = child.stdin.take() {
            thread::spawn(move || stdin.write_all(prompt.as_bytes()));
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        thread::spawn(move || {
            let mut out = String::new();
            let mut err = String::new();
            let read = stdout.as_mut().map_or(Ok(0), |s| s.read_to_string(&mut out));
            if let Some(s) = stderr.as_mut() {
                s.read_to_string(&mut err).ok();
            }
            tx.send(read.map(|_| (out, err))).ok();
        });

        let output = match rx.recv_timeout(self.timeout) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                child.kill().ok();
                child.wait().ok();
                return Err(SgError::Timeout(format!(
                    "code generation command exceeded {}s",
                    self.timeout.as_secs()
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                child.kill().ok();
                child.wait().ok();
                return Err(SgError::Generation(format!(
                    "output reader for {} stopped unexpectedly",
                    self.argv[0]
                )));
            }
        };
        let (stdout, stderr) = output?;

        let status = child.wait()?;
        if !status.success() {
            return Err(SgError::Generation(format!(
                "{} exited with {status}: {}",
                self.argv[0],
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

/// Build the generator selected by configuration.
pub fn from_config(config: &GeneratorConfig) -> Result<Box<dyn CodeGenerator>> {
    Ok(match config.kind {
        GeneratorKind::None => Box::new(DisabledGenerator),
        GeneratorKind::Http => Box::new(HttpGenerator::new(config)?),
        GeneratorKind::Command => Box::new(CommandGenerator::new(
            config.command.clone(),
            config.timeout,
        )?),
    })
}

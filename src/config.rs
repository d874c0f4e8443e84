use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::kernel::DEFAULT_MAX_DISPATCH_DEPTH;
use crate::error::{Result, SgError};
use crate::pipeline::gate::{GateMode, GatePolicy};
use crate::pipeline::status::Status;
use crate::storage::store::DEFAULT_IMPLEMENTATIONS_DIR;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub gates: GatePolicy,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SKILLGATE_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join("skillgate/config.toml")),
            None => Ok(None),
        }
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        let path = root.join("config.toml");
        Self::load_patch(&path)
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| SgError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| SgError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.pipeline {
            self.pipeline.merge(patch);
        }
        if let Some(patch) = patch.gates {
            patch.apply(&mut self.gates);
        }
        if let Some(patch) = patch.generator {
            self.generator.merge(patch);
        }
        if let Some(patch) = patch.agent {
            self.agent.merge(patch);
        }
        if let Some(patch) = patch.system {
            self.system.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_u64("SKILLGATE_POLL_INTERVAL_SECS")? {
            self.pipeline.poll_interval = Duration::from_secs(value);
        }
        if let Some(value) = env_string("SKILLGATE_IMPLEMENTATIONS_DIR") {
            self.pipeline.implementations_dir = value;
        }

        for target in [
            Status::Discovered,
            Status::Implementation,
            Status::AgentReview,
            Status::HumanReview,
            Status::Accepted,
        ] {
            let key = format!(
                "SKILLGATE_GATE_{}",
                target.as_str().replace('-', "_").to_uppercase()
            );
            if let Some(value) = env_string(&key) {
                self.gates.set(target, parse_gate_mode(&key, &value)?);
            }
        }

        if let Some(value) = env_string("SKILLGATE_GENERATOR_KIND") {
            self.generator.kind = parse_generator_kind(&value)?;
        }
        if let Some(value) = env_string("SKILLGATE_GENERATOR_ENDPOINT") {
            self.generator.endpoint = value;
        }
        if let Some(value) = env_string("SKILLGATE_GENERATOR_MODEL") {
            self.generator.model = value;
        }
        if let Some(value) = env_string("SKILLGATE_GENERATOR_API_KEY_ENV") {
            self.generator.api_key_env = Some(value);
        }
        if let Some(value) = env_u64("SKILLGATE_GENERATOR_TIMEOUT_SECS")? {
            self.generator.timeout = Duration::from_secs(value);
        }
        if let Some(value) = env_u32("SKILLGATE_GENERATOR_MAX_TOKENS")? {
            self.generator.max_tokens = value;
        }
        if let Some(value) = env_f32("SKILLGATE_GENERATOR_TEMPERATURE")? {
            self.generator.temperature = value;
        }
        if let Some(values) = env_list("SKILLGATE_GENERATOR_COMMAND")? {
            self.generator.command = values;
        }

        if let Some(value) = env_string("SKILLGATE_PROFILE") {
            self.agent.profile = value;
        }
        if let Some(value) = env_u64("SKILLGATE_MAX_DISPATCH_DEPTH")? {
            self.agent.max_dispatch_depth = usize::try_from(value).map_err(|err| {
                SgError::Config(format!("invalid SKILLGATE_MAX_DISPATCH_DEPTH value {value}: {err}"))
            })?;
        }

        if let Some(value) = env_string("SKILLGATE_PLATFORM") {
            self.system.platform = value;
        }
        if let Some(values) = env_list("SKILLGATE_INSTALLED_PACKAGES")? {
            self.system.installed_packages = values;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_implementations_dir")]
    pub implementations_dir: String,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_implementations_dir() -> String {
    DEFAULT_IMPLEMENTATIONS_DIR.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            implementations_dir: default_implementations_dir(),
        }
    }
}

impl PipelineConfig {
    fn merge(&mut self, patch: PipelinePatch) {
        if let Some(value) = patch.poll_interval {
            self.poll_interval = value;
        }
        if let Some(value) = patch.implementations_dir {
            self.implementations_dir = value;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    None,
    Http,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub kind: GeneratorKind,
    /// Full chat-completions URL for the `http` kind.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_generator_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Argv for the `command` kind. The prompt goes to stdin.
    #[serde(default)]
    pub command: Vec<String>,
}

fn default_endpoint() -> String {
    "http://localhost:8080/v1/chat/completions".to_string()
}

fn default_generator_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_tokens() -> u32 {
    2048
}

const fn default_temperature() -> f32 {
    0.2
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::None,
            endpoint: default_endpoint(),
            model: String::new(),
            api_key_env: None,
            timeout: default_generator_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            command: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    fn merge(&mut self, patch: GeneratorPatch) {
        if let Some(value) = patch.kind {
            self.kind = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = Some(value);
        }
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
        if let Some(value) = patch.max_tokens {
            self.max_tokens = value;
        }
        if let Some(value) = patch.temperature {
            self.temperature = value;
        }
        if let Some(value) = patch.command {
            self.command = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_max_dispatch_depth")]
    pub max_dispatch_depth: usize,
}

fn default_profile() -> String {
    "default".to_string()
}

const fn default_max_dispatch_depth() -> usize {
    DEFAULT_MAX_DISPATCH_DEPTH
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            max_dispatch_depth: default_max_dispatch_depth(),
        }
    }
}

impl AgentConfig {
    fn merge(&mut self, patch: AgentPatch) {
        if let Some(value) = patch.profile {
            self.profile = value;
        }
        if let Some(value) = patch.max_dispatch_depth {
            self.max_dispatch_depth = value;
        }
    }
}

/// Facts about the host handed to the code generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,
    #[serde(default)]
    pub installed_packages: Vec<String>,
}

fn default_platform() -> String {
    std::env::consts::OS.to_string()
}

fn default_runtime_version() -> String {
    "3.11".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            runtime_version: default_runtime_version(),
            installed_packages: Vec::new(),
        }
    }
}

impl SystemConfig {
    fn merge(&mut self, patch: SystemPatch) {
        if let Some(value) = patch.platform {
            self.platform = value;
        }
        if let Some(value) = patch.runtime_version {
            self.runtime_version = value;
        }
        if let Some(value) = patch.installed_packages {
            self.installed_packages = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub pipeline: Option<PipelinePatch>,
    pub gates: Option<GatesPatch>,
    pub generator: Option<GeneratorPatch>,
    pub agent: Option<AgentPatch>,
    pub system: Option<SystemPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelinePatch {
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    pub implementations_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GatesPatch {
    pub discovered: Option<GateMode>,
    pub implementation: Option<GateMode>,
    #[serde(rename = "agent-review")]
    pub agent_review: Option<GateMode>,
    #[serde(rename = "human-review")]
    pub human_review: Option<GateMode>,
    pub accepted: Option<GateMode>,
}

impl GatesPatch {
    fn apply(self, gates: &mut GatePolicy) {
        let entries = [
            (Status::Discovered, self.discovered),
            (Status::Implementation, self.implementation),
            (Status::AgentReview, self.agent_review),
            (Status::HumanReview, self.human_review),
            (Status::Accepted, self.accepted),
        ];
        for (target, mode) in entries {
            if let Some(mode) = mode {
                gates.set(target, mode);
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GeneratorPatch {
    pub kind: Option<GeneratorKind>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AgentPatch {
    pub profile: Option<String>,
    pub max_dispatch_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SystemPatch {
    pub platform: Option<String>,
    pub runtime_version: Option<String>,
    pub installed_packages: Option<Vec<String>>,
}

fn parse_gate_mode(key: &str, value: &str) -> Result<GateMode> {
    match value.to_lowercase().as_str() {
        "auto" => Ok(GateMode::Auto),
        "human" => Ok(GateMode::Human),
        _ => Err(SgError::Config(format!(
            "invalid {key} value {value} (expected auto|human)"
        ))),
    }
}

fn parse_generator_kind(value: &str) -> Result<GeneratorKind> {
    match value.to_lowercase().as_str() {
        "none" => Ok(GeneratorKind::None),
        "http" => Ok(GeneratorKind::Http),
        "command" => Ok(GeneratorKind::Command),
        _ => Err(SgError::Config(format!(
            "invalid generator kind {value} (expected none|http|command)"
        ))),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            SgError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            SgError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<f32>().map(Some).map_err(|err| {
            SgError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_list(key: &str) -> Result<Option<Vec<String>>> {
    match std::env::var(key) {
        Ok(value) => {
            let list = value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();
            Ok(Some(list))
        }
        Err(_) => Ok(None),
    }
}

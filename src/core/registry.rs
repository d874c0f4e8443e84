//! Skill registry built from the manifest at boot.
//!
//! Manifest entries are resolved through a static [`SkillCatalog`] of
//! constructors; nothing is loaded dynamically. Once the kernel boots the
//! registry is frozen and the set of skills never changes again.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::capability::{self, USER_INPUT};
use crate::core::skill::{Skill, Tool};
use crate::error::{Result, SgError};
use crate::security::validate_identifier;
use crate::storage::{Manifest, ManifestEntry};

/// Constructor for a catalogued skill.
pub type SkillFactory = fn() -> Box<dyn Skill>;

#[derive(Clone)]
pub struct CatalogEntry {
    pub module: &'static str,
    pub class: &'static str,
    factory: SkillFactory,
}

impl CatalogEntry {
    #[must_use]
    pub fn build(&self) -> Box<dyn Skill> {
        (self.factory)()
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("module", &self.module)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// Table mapping `(module, class)` manifest references to constructors.
#[derive(Debug, Clone, Default)]
pub struct SkillCatalog {
    entries: Vec<CatalogEntry>,
}

impl SkillCatalog {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, module: &'static str, class: &'static str, factory: SkillFactory) -> Self {
        self.register(module, class, factory);
        self
    }

    pub fn register(&mut self, module: &'static str, class: &'static str, factory: SkillFactory) {
        self.entries.retain(|e| !(e.module == module && e.class == class));
        self.entries.push(CatalogEntry {
            module,
            class,
            factory,
        });
    }

    #[must_use]
    pub fn lookup(&self, module: &str, class: &str) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.module == module && e.class == class)
    }
}

/// Check a freshly built skill against the declared-surface rules.
pub fn validate_skill(skill: &dyn Skill) -> Result<()> {
    validate_identifier(skill.name()).map_err(|err| {
        SgError::Validation(format!("skill name '{}' is invalid: {err}", skill.name()))
    })?;
    if let Some(event) = skill.handles_events().iter().find(|e| e.trim().is_empty()) {
        return Err(SgError::Validation(format!(
            "skill '{}' declares an empty event type {event:?}",
            skill.name()
        )));
    }
    let mut seen = HashSet::new();
    for tool in skill.tools() {
        if tool.name().trim().is_empty() || !seen.insert(tool.name().to_string()) {
            return Err(SgError::Validation(format!(
                "skill '{}' declares an empty or duplicate tool name '{}'",
                skill.name(),
                tool.name()
            )));
        }
    }
    Ok(())
}

/// Ordered set of loaded skills.
#[derive(Default)]
pub struct SkillRegistry {
    skills: Vec<Arc<dyn Skill>>,
    frozen: bool,
}

impl SkillRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from manifest entries, skipping anything that fails.
    #[must_use]
    pub fn load(manifest: &Manifest, catalog: &SkillCatalog) -> Self {
        let mut registry = Self::new();
        for entry in &manifest.skills {
            let Some(skill) = instantiate(entry, catalog) else {
                continue;
            };
            // Not frozen yet, so registration cannot fail here.
            registry.register(skill).ok();
        }
        registry
    }

    /// Register a skill. Returns `Ok(false)` when the name is already taken.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> Result<bool> {
        if self.frozen {
            return Err(SgError::RegistryFrozen(skill.name().to_string()));
        }
        if self.get(skill.name()).is_some() {
            warn!(skill = skill.name(), "duplicate skill name, keeping the first registration");
            return Ok(false);
        }
        debug!(skill = skill.name(), "registered skill");
        self.skills.push(skill);
        Ok(true)
    }

    pub fn freeze(&mut self) {
        if self.frozen {
            warn!("registry already frozen");
        }
        self.frozen = true;
    }

    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.iter().find(|s| s.name() == name)
    }

    #[must_use]
    pub fn skills(&self) -> &[Arc<dyn Skill>] {
        &self.skills
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Skills that handle `event_type`, in registration order.
    pub fn handlers_for<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a Arc<dyn Skill>> {
        self.skills
            .iter()
            .filter(move |s| s.handles_events().iter().any(|e| *e == event_type))
    }

    /// The interaction entry point: the first skill holding `user:input`.
    pub fn find_driver(&self) -> Result<Arc<dyn Skill>> {
        let mut drivers = self
            .skills
            .iter()
            .filter(|s| capability::holds(&s.capabilities(), USER_INPUT));
        let driver = drivers.next().cloned().ok_or_else(|| {
            SgError::Boot(format!(
                "No skill with '{USER_INPUT}' capability found. At least one interaction skill is required."
            ))
        })?;
        for extra in drivers {
            warn!(skill = extra.name(), driver = driver.name(), "additional user:input skill ignored as driver");
        }
        Ok(driver)
    }

    #[must_use]
    pub fn find_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.skills
            .iter()
            .flat_map(|s| s.tools())
            .find(|t| t.name() == name)
    }

    /// Tool definitions in the function-calling shape.
    #[must_use]
    pub fn tool_schemas(&self) -> Vec<Value> {
        self.skills
            .iter()
            .flat_map(|s| s.tools())
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters_schema(),
                    }
                })
            })
            .collect()
    }
}

fn instantiate(entry: &ManifestEntry, catalog: &SkillCatalog) -> Option<Arc<dyn Skill>> {
    if entry.module.trim().is_empty() || entry.class.trim().is_empty() {
        warn!(?entry, "manifest entry missing module or class, skipping");
        return None;
    }
    let Some(catalogued) = catalog.lookup(&entry.module, &entry.class) else {
        warn!(
            module = %entry.module,
            class = %entry.class,
            "no registered constructor for manifest entry, skipping"
        );
        return None;
    };
    let skill = catalogued.build();
    if let Err(err) = validate_skill(skill.as_ref()) {
        warn!(module = %entry.module, error = %err, "skill failed validation, skipping");
        return None;
    }
    Some(Arc::from(skill))
}

//! Core skills shipped with the agent.

pub mod cli;
pub mod memory;
pub mod proposer;
pub mod reasoning;

pub use cli::CliSkill;
pub use memory::MemorySkill;
pub use proposer::ProposerSkill;
pub use reasoning::ReasoningSkill;

use crate::core::registry::SkillCatalog;
use crate::core::skill::Skill;
use crate::storage::{Manifest, ManifestEntry};

/// Module names that can never be removed.
pub const CORE_MODULES: &[&str] = &["cli", "reasoning", "memory", "proposer"];

/// Manifest module prefix of catalogued skills.
pub const BUILTIN_PREFIX: &str = "builtin.";

const BUILTINS: &[(&str, &str, fn() -> Box<dyn Skill>)] = &[
    ("builtin.cli", "CliSkill", || Box::new(CliSkill::default())),
    ("builtin.reasoning", "ReasoningSkill", || Box::new(ReasoningSkill)),
    ("builtin.memory", "MemorySkill", || Box::new(MemorySkill::default())),
    ("builtin.proposer", "ProposerSkill", || Box::new(ProposerSkill)),
];

/// Catalog of every skill the binary can construct.
#[must_use]
pub fn builtin_catalog() -> SkillCatalog {
    BUILTINS
        .iter()
        .fold(SkillCatalog::new(), |catalog, (module, class, factory)| {
            catalog.with(*module, *class, *factory)
        })
}

/// Manifest that loads the core skills, in driver-first order.
#[must_use]
pub fn builtin_manifest() -> Manifest {
    Manifest {
        skills: BUILTINS
            .iter()
            .map(|(module, class, _)| ManifestEntry::new(*module, *class))
            .collect(),
    }
}

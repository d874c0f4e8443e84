//! Installing an accepted proposal as a skill package, and removing it again.
//!
//! The manifest entry is written first and the package second. If any part of
//! the package write fails, the entry and the partial directory are removed
//! before the error is returned, so the manifest and `skills/` never disagree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::analyzer::tree;
use crate::error::{Result, SgError};
use crate::pipeline::actions::{INSTALLED_MODULE_PREFIX, implementation_file};
use crate::security::{Sandbox, validate_identifier};
use crate::storage::manifest::{register_module, unregister_module};
use crate::storage::{ManifestEntry, ProposalRecord, ProposalStore};

pub const SKILLS_DIR: &str = "skills";
pub const SKILL_BASE_CLASS: &str = "BaseSkill";

/// Writes the files of one skill package.
pub trait PackageWriter: Send + Sync {
    /// Create `dir` (root-relative) holding `skill.py` and `__init__.py`.
    fn write_package(&self, sandbox: &Sandbox, dir: &Path, source: &str, init: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsPackageWriter;

impl PackageWriter for FsPackageWriter {
    fn write_package(&self, sandbox: &Sandbox, dir: &Path, source: &str, init: &str) -> Result<()> {
        sandbox.create_dir(dir)?;
        sandbox.write(dir.join("skill.py"), source)?;
        sandbox.write(dir.join("__init__.py"), init)?;
        Ok(())
    }
}

/// What an install produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installed {
    pub name: String,
    pub module_path: String,
    pub class: String,
    pub dir: PathBuf,
}

impl Installed {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Skill '{}' installed to {} and added to manifest. Restart the agent to activate.",
            self.name,
            self.dir.display()
        )
    }
}

/// Package `__init__.py` re-exporting the skill class.
#[must_use]
pub fn init_module(name: &str, module_path: &str, class: &str) -> String {
    format!(
        "\"\"\"{name} skill.\"\"\"\n\nfrom {module_path}.skill import {class}\n\n__all__ = [\"{class}\"]\n"
    )
}

/// Name of the class in `source` that subclasses [`SKILL_BASE_CLASS`].
pub fn skill_class(source: &str, path: &Path) -> Result<String> {
    tree::parse(source)
        .ok()
        .and_then(|module| tree::find_subclass(&module, SKILL_BASE_CLASS))
        .ok_or_else(|| {
            SgError::Install(format!(
                "No {SKILL_BASE_CLASS} subclass found in {}. Cannot determine class name for manifest entry.",
                path.display()
            ))
        })
}

pub struct Installer {
    sandbox: Sandbox,
    writer: Box<dyn PackageWriter>,
}

impl Installer {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self::with_writer(sandbox, Box::new(FsPackageWriter))
    }

    #[must_use]
    pub fn with_writer(sandbox: Sandbox, writer: Box<dyn PackageWriter>) -> Self {
        Self { sandbox, writer }
    }

    /// Root-relative package directory for a module name.
    #[must_use]
    pub fn package_dir(module: &str) -> PathBuf {
        Path::new(SKILLS_DIR).join(module)
    }

    /// Install `record`. Every failure other than a path violation comes back
    /// as [`SgError::Install`].
    pub fn install(&self, record: &ProposalRecord, store: &ProposalStore) -> Result<Installed> {
        self.try_install(record, store).map_err(|err| match err {
            SgError::Install(_) | SgError::PathViolation(_) => err,
            other => SgError::Install(format!("{}: {other}", record.slug())),
        })
    }

    fn try_install(&self, record: &ProposalRecord, store: &ProposalStore) -> Result<Installed> {
        let Some(code_path) = implementation_file(record, store) else {
            return Err(SgError::Install(format!(
                "No implementation file found for '{}' (expected {})",
                record.slug(),
                self.sandbox
                    .root()
                    .join(store.implementation_path(record.slug()))
                    .display()
            )));
        };
        let source = fs::read_to_string(&code_path)?;
        let class = skill_class(&source, &code_path)?;

        let module = record.proposal.module_name();
        validate_identifier(&module)?;
        let module_path = format!("{INSTALLED_MODULE_PREFIX}{module}");
        let relative_dir = Self::package_dir(&module);
        let dir = self.sandbox.root().join(&relative_dir);
        if dir.exists() {
            return Err(SgError::Install(format!(
                "Target directory already exists: {}. Skill '{module}' may already be installed.",
                dir.display()
            )));
        }

        register_module(&self.sandbox, ManifestEntry::new(&module_path, &class))?;

        let name = record.display_name().to_string();
        let init = init_module(&name, &module_path, &class);
        if let Err(err) = self.writer.write_package(&self.sandbox, &relative_dir, &source, &init) {
            self.rollback(&module_path, &relative_dir);
            return Err(match err {
                SgError::Install(_) | SgError::PathViolation(_) => err,
                other => SgError::Install(format!("writing package {}: {other}", dir.display())),
            });
        }

        info!(skill = %name, module = %module_path, %class, dir = %dir.display(), "skill installed");
        Ok(Installed {
            name,
            module_path,
            class,
            dir,
        })
    }

    fn rollback(&self, module_path: &str, relative_dir: &Path) {
        if let Err(err) = unregister_module(&self.sandbox, module_path) {
            warn!(module = %module_path, error = %err, "rollback: failed to remove manifest entry");
        }
        if let Err(err) = self.sandbox.remove_dir_all(relative_dir) {
            warn!(dir = %relative_dir.display(), error = %err, "rollback: failed to remove package");
        }
        info!(module = %module_path, "install rolled back");
    }

    /// Drop the manifest entry, then the package directory.
    pub fn uninstall(&self, module: &str) -> Result<()> {
        validate_identifier(module)?;
        let module_path = format!("{INSTALLED_MODULE_PREFIX}{module}");
        unregister_module(&self.sandbox, &module_path)?;
        if self.sandbox.remove_dir_all(Self::package_dir(module))? {
            info!(%module, "skill package removed");
        }
        Ok(())
    }
}

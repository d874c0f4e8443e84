//! The skill manifest: which `{module, class}` pairs the agent loads.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, SgError};
use crate::security::Sandbox;

/// Manifest location relative to the data root.
pub const MANIFEST_PATH: &str = "skills/manifest.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub class: String,
}

impl ManifestEntry {
    pub fn new(module: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            class: class.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub skills: Vec<ManifestEntry>,
}

impl Manifest {
    #[must_use]
    pub fn path(root: &Path) -> PathBuf {
        root.join(MANIFEST_PATH)
    }

    #[must_use]
    pub fn exists(root: &Path) -> bool {
        Self::path(root).is_file()
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load the manifest under `root`. A missing file is an error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.is_file() {
            return Err(SgError::NotFound(format!(
                "manifest file not found at {}; run `skillgate init`",
                path.display()
            )));
        }
        Self::parse(&fs::read_to_string(&path)?)
    }

    /// Like [`Manifest::load`], but an absent manifest reads as empty.
    pub fn load_or_default(root: &Path) -> Result<Self> {
        if Self::exists(root) {
            Self::load(root)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, sandbox: &Sandbox) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        sandbox.write_atomic(MANIFEST_PATH, yaml)?;
        Ok(())
    }

    #[must_use]
    pub fn contains_module(&self, module: &str) -> bool {
        self.skills.iter().any(|entry| entry.module == module)
    }

    pub fn add(&mut self, entry: ManifestEntry) -> Result<()> {
        if self.contains_module(&entry.module) {
            return Err(SgError::Install(format!(
                "Module '{}' already exists in the manifest. Skill may already be installed.",
                entry.module
            )));
        }
        self.skills.push(entry);
        Ok(())
    }

    /// Remove every entry for `module`. Returns whether anything was removed.
    pub fn remove_module(&mut self, module: &str) -> bool {
        let before = self.skills.len();
        self.skills.retain(|entry| entry.module != module);
        before != self.skills.len()
    }
}

/// Append an entry to the on-disk manifest, creating it when absent.
pub fn register_module(sandbox: &Sandbox, entry: ManifestEntry) -> Result<()> {
    let mut manifest = Manifest::load_or_default(sandbox.root())?;
    let (module, class) = (entry.module.clone(), entry.class.clone());
    manifest.add(entry)?;
    manifest.save(sandbox)?;
    info!(%module, %class, "manifest entry added");
    Ok(())
}

/// Drop an entry from the on-disk manifest. A missing manifest is a no-op.
pub fn unregister_module(sandbox: &Sandbox, module: &str) -> Result<bool> {
    if !Manifest::exists(sandbox.root()) {
        return Ok(false);
    }
    let mut manifest = Manifest::load(sandbox.root())?;
    let removed = manifest.remove_module(module);
    if removed {
        manifest.save(sandbox)?;
        info!(%module, "manifest entry removed");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn admin() -> (TempDir, Sandbox) {
        let temp = TempDir::new().unwrap();
        let sandbox = Sandbox::admin(temp.path()).unwrap();
        (temp, sandbox)
    }

    #[test]
    fn parses_documented_shape() {
        let manifest = Manifest::parse(
            "skills:\n  - module: builtin.cli\n    class: CliSkill\n  - module: skills.clock\n    class: ClockSkill\n",
        )
        .unwrap();
        assert_eq!(manifest.skills.len(), 2);
        assert_eq!(manifest.skills[1], ManifestEntry::new("skills.clock", "ClockSkill"));
    }

    #[test]
    fn empty_text_is_empty_manifest() {
        assert_eq!(Manifest::parse("  \n").unwrap(), Manifest::default());
    }

    #[test]
    fn add_rejects_duplicate_module() {
        let mut manifest = Manifest::default();
        manifest.add(ManifestEntry::new("skills.clock", "ClockSkill")).unwrap();
        let err = manifest
            .add(ManifestEntry::new("skills.clock", "Other"))
            .unwrap_err();
        assert!(matches!(err, SgError::Install(_)));
        assert_eq!(manifest.skills.len(), 1);
    }

    #[test]
    fn register_creates_missing_manifest() {
        let (_temp, sandbox) = admin();
        register_module(&sandbox, ManifestEntry::new("skills.x", "X")).unwrap();
        let manifest = Manifest::load(sandbox.root()).unwrap();
        assert_eq!(manifest.skills, [ManifestEntry::new("skills.x", "X")]);
    }

    #[test]
    fn register_refuses_corrupt_manifest() {
        let (temp, sandbox) = admin();
        std::fs::create_dir_all(temp.path().join("skills")).unwrap();
        std::fs::write(temp.path().join(MANIFEST_PATH), "skills: [unterminated\n").unwrap();
        assert!(register_module(&sandbox, ManifestEntry::new("skills.x", "X")).is_err());
    }

    #[test]
    fn register_and_unregister_round_trip_on_disk() {
        let (_temp, sandbox) = admin();
        Manifest::default().save(&sandbox).unwrap();

        register_module(&sandbox, ManifestEntry::new("skills.clock", "ClockSkill")).unwrap();
        assert!(Manifest::load(sandbox.root()).unwrap().contains_module("skills.clock"));

        assert!(unregister_module(&sandbox, "skills.clock").unwrap());
        assert!(!unregister_module(&sandbox, "skills.clock").unwrap());
        assert!(Manifest::load(sandbox.root()).unwrap().skills.is_empty());
    }
}

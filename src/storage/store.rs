//! Proposal files on disk.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{Result, SgError};
use crate::pipeline::status::Status;
use crate::security::{Sandbox, validate_identifier};
use crate::storage::proposal::{ProposalRecord, ProposalSpec};

pub const PROPOSALS_DIR: &str = "proposals";
pub const DEFAULT_IMPLEMENTATIONS_DIR: &str = "_implementations";

/// Reads and writes `proposals/proposed_<slug>_<timestamp>.yaml` records.
///
/// Reads go straight to the filesystem; every write resolves through the
/// store's sandbox.
#[derive(Debug, Clone)]
pub struct ProposalStore {
    sandbox: Sandbox,
    implementations_dir: String,
}

impl ProposalStore {
    #[must_use]
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            implementations_dir: DEFAULT_IMPLEMENTATIONS_DIR.to_string(),
        }
    }

    #[must_use]
    pub fn with_implementations_dir(mut self, dir: impl Into<String>) -> Self {
        self.implementations_dir = dir.into();
        self
    }

    #[must_use]
    pub const fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.sandbox.root().join(PROPOSALS_DIR)
    }

    /// Relative path of a slug's generated implementation.
    #[must_use]
    pub fn implementation_path(&self, slug: &str) -> PathBuf {
        Path::new(PROPOSALS_DIR)
            .join(&self.implementations_dir)
            .join(format!("{slug}.py"))
    }

    /// Record files sorted by name; empty when the directory is missing.
    pub fn paths(&self) -> Result<Vec<PathBuf>> {
        let dir = self.dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with("proposed_") && name.ends_with(".yaml"))
            .collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| Path::new(PROPOSALS_DIR).join(name))
            .collect())
    }

    /// Load one record from a root-relative path.
    pub fn load(&self, relative: &Path) -> Result<ProposalRecord> {
        let text = fs::read_to_string(self.sandbox.root().join(relative))?;
        let mut record: ProposalRecord = serde_yaml::from_str(&text)?;
        record.location = Some(relative.to_path_buf());
        Ok(record)
    }

    /// Every readable record, optionally filtered by status.
    pub fn list(&self, status: Option<Status>) -> Result<Vec<ProposalRecord>> {
        let mut records = Vec::new();
        for path in self.paths()? {
            match self.load(&path) {
                Ok(record) if status.is_none_or(|s| s == record.status) => records.push(record),
                Ok(_) => {}
                Err(err) => debug!(path = %path.display(), error = %err, "skipping unreadable proposal"),
            }
        }
        Ok(records)
    }

    /// Records the orchestrator still has work for.
    pub fn pending(&self) -> Result<Vec<ProposalRecord>> {
        let mut records = Vec::new();
        for path in self.paths()? {
            match self.load(&path) {
                Ok(record) if !record.status.is_terminal() => records.push(record),
                Ok(_) => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to load proposal"),
            }
        }
        Ok(records)
    }

    /// First record whose id or slug equals `id_or_slug`.
    pub fn find(&self, id_or_slug: &str) -> Result<ProposalRecord> {
        self.list(None)?
            .into_iter()
            .find(|record| record.matches(id_or_slug))
            .ok_or_else(|| SgError::ProposalNotFound(id_or_slug.to_string()))
    }

    /// Persist a record to the file it was loaded from or created at.
    pub fn save(&self, record: &ProposalRecord) -> Result<()> {
        let location = record.location.as_ref().ok_or_else(|| {
            SgError::NotFound(format!("proposal '{}' has no file location", record.slug()))
        })?;
        let yaml = serde_yaml::to_string(record)?;
        self.sandbox.write_atomic(location, yaml)?;
        Ok(())
    }

    /// Write a new record in status `new` and return it.
    pub fn create(&self, spec: ProposalSpec, now: DateTime<Utc>) -> Result<ProposalRecord> {
        validate_identifier(&spec.slug)?;

        let stamp = now.format("%Y%m%d_%H%M%S");
        let mut name = format!("proposed_{}_{stamp}.yaml", spec.slug);
        let mut suffix = 2;
        while self.dir().join(&name).exists() {
            name = format!("proposed_{}_{stamp}_{suffix}.yaml", spec.slug);
            suffix += 1;
        }

        let mut record = ProposalRecord::new(spec);
        record.location = Some(Path::new(PROPOSALS_DIR).join(&name));
        self.save(&record)?;
        info!(slug = record.slug(), file = %name, "proposal created");
        Ok(record)
    }
}

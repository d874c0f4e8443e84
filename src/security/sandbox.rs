//! Write confinement for the data root.
//!
//! Every write, append, directory creation or removal performed by skillgate
//! goes through a [`Sandbox`]. A target is joined onto the data root,
//! normalized, resolved through any existing symlinks, and then checked
//! against two rules:
//!
//! - the resolved path must be a descendant of the root
//! - its first segment below the root must be an allow-listed directory
//!
//! Reads are unrestricted and do not need a sandbox.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// Directories the agent runtime may write below the data root.
pub const AGENT_WRITABLE: &[&str] = &["profiles", "proposals"];

/// Directories the orchestrator may write below the data root.
pub const ADMIN_WRITABLE: &[&str] = &["proposals", "skills"];

static IDENTIFIER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("valid identifier regex")
});

/// A write target that failed confinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathViolation {
    /// Resolved path lies outside the data root
    EscapesRoot { path: PathBuf, root: PathBuf },
    /// First segment below the root is not writable
    DisallowedDirectory { segment: String, allowed: Vec<String> },
    /// Target resolves to the data root itself
    RootTarget,
    /// A symlink on the path could not be resolved
    Unresolvable { path: PathBuf, reason: String },
    /// Identifier is not safe to interpolate into a path
    InvalidIdentifier { value: String },
}

impl std::fmt::Display for PathViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EscapesRoot { path, root } => {
                write!(f, "path {} escapes data root {}", path.display(), root.display())
            }
            Self::DisallowedDirectory { segment, allowed } => write!(
                f,
                "directory '{segment}' is not writable (allowed: {})",
                allowed.join(", ")
            ),
            Self::RootTarget => write!(f, "cannot write to the data root itself"),
            Self::Unresolvable { path, reason } => {
                write!(f, "cannot resolve {}: {reason}", path.display())
            }
            Self::InvalidIdentifier { value } => write!(
                f,
                "invalid identifier {value:?} (expected 1-64 of [A-Za-z0-9_-], starting alphanumeric)"
            ),
        }
    }
}

impl std::error::Error for PathViolation {}

/// Validate an identifier before it is used to build a path.
pub fn validate_identifier(value: &str) -> std::result::Result<(), PathViolation> {
    if IDENTIFIER_REGEX.is_match(value) {
        Ok(())
    } else {
        Err(PathViolation::InvalidIdentifier {
            value: value.to_string(),
        })
    }
}

/// Write gate rooted at a canonical data directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    allowed: Vec<String>,
}

impl Sandbox {
    /// Create a sandbox over `root`, creating the root if needed.
    pub fn new(root: impl AsRef<Path>, allowed: &[&str]) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
            allowed: allowed.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    /// Sandbox used by the agent runtime and its skills.
    pub fn agent(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(root, AGENT_WRITABLE)
    }

    /// Sandbox used by the orchestrator and the administrative commands.
    pub fn admin(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(root, ADMIN_WRITABLE)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Resolve a write target, enforcing root containment and the allow-list.
    pub fn resolve(&self, target: impl AsRef<Path>) -> std::result::Result<PathBuf, PathViolation> {
        let normalized = normalize(&self.root.join(target.as_ref()));
        let resolved = resolve_existing_prefix(&normalized)?;

        let Ok(relative) = resolved.strip_prefix(&self.root) else {
            return Err(PathViolation::EscapesRoot {
                path: resolved,
                root: self.root.clone(),
            });
        };

        let segment = match relative.components().next() {
            Some(Component::Normal(segment)) => segment.to_string_lossy().into_owned(),
            _ => return Err(PathViolation::RootTarget),
        };

        if !self.allowed.iter().any(|allowed| *allowed == segment) {
            return Err(PathViolation::DisallowedDirectory {
                segment,
                allowed: self.allowed.clone(),
            });
        }

        Ok(resolved)
    }

    /// Write a file, creating parent directories inside the sandbox.
    pub fn write(&self, target: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.resolve(target)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write a file through a temporary sibling and an atomic rename.
    pub fn write_atomic(
        &self,
        target: impl AsRef<Path>,
        contents: impl AsRef<[u8]>,
    ) -> Result<PathBuf> {
        let path = self.resolve(target)?;
        let parent = path
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        fs::create_dir_all(&parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        temp.write_all(contents.as_ref())?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|err| err.error)?;
        Ok(path)
    }

    /// Append to a file, creating it and its parents if needed.
    pub fn append(&self, target: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.resolve(target)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(contents.as_ref())?;
        Ok(path)
    }

    /// Create a directory (and parents) inside the sandbox.
    pub fn create_dir(&self, target: impl AsRef<Path>) -> Result<PathBuf> {
        let path = self.resolve(target)?;
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    /// Recursively remove a directory. Returns `false` if it did not exist.
    pub fn remove_dir_all(&self, target: impl AsRef<Path>) -> Result<bool> {
        let path = self.resolve(target)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&path)?;
        Ok(true)
    }
}

/// Lexically normalize `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the deepest existing ancestor and re-attach the rest.
fn resolve_existing_prefix(path: &Path) -> std::result::Result<PathBuf, PathViolation> {
    let mut existing = path.to_path_buf();
    let mut rest: Vec<std::ffi::OsString> = Vec::new();

    while fs::symlink_metadata(&existing).is_err() {
        let Some(name) = existing.file_name().map(std::ffi::OsStr::to_os_string) else {
            break;
        };
        rest.push(name);
        if !existing.pop() {
            break;
        }
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|err| PathViolation::Unresolvable {
            path: existing.clone(),
            reason: err.to_string(),
        })?;
    for name in rest.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

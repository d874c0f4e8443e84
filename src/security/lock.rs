//! Single-orchestrator advisory lock.
//!
//! One orchestrator owns the proposal store and the skills directory at a
//! time. The lock file lives inside the proposals directory and records who
//! holds it.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SgError};
use crate::security::Sandbox;

const LOCK_PATH: &str = "proposals/.orchestrator.lock";

/// Exclusive lock held for the lifetime of an orchestrator process.
pub struct OrchestratorLock {
    lock_file: File,
    lock_path: PathBuf,
}

impl OrchestratorLock {
    /// Try to take the lock without blocking. `None` means it is held elsewhere.
    pub fn try_acquire(sandbox: &Sandbox) -> Result<Option<Self>> {
        let lock_path = sandbox.resolve(LOCK_PATH)?;
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| SgError::LockFailed(format!("open lock file: {e}")))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                debug!("orchestrator lock held by another process");
                return Ok(None);
            }
            Err(e) => return Err(SgError::LockFailed(format!("try acquire lock: {e}"))),
        }

        let holder = LockHolder::current();
        if let Ok(json) = serde_json::to_string(&holder) {
            lock_file.set_len(0).ok();
            lock_file.write_all(json.as_bytes()).ok();
        }

        debug!(path = %lock_path.display(), "acquired orchestrator lock");
        Ok(Some(Self {
            lock_file,
            lock_path,
        }))
    }

    /// Take the lock or fail with a message naming the current holder.
    pub fn acquire(sandbox: &Sandbox) -> Result<Self> {
        Self::try_acquire(sandbox)?.ok_or_else(|| {
            let holder = Self::status(sandbox)
                .ok()
                .flatten()
                .map(|h| format!(" (pid {} on {} since {})", h.pid, h.hostname, h.acquired_at))
                .unwrap_or_default();
            SgError::LockFailed(format!("another orchestrator owns this data root{holder}"))
        })
    }

    /// Poll for the lock until `timeout` elapses.
    pub fn acquire_timeout(sandbox: &Sandbox, timeout: Duration) -> Result<Self> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(50);

        while start.elapsed() < timeout {
            if let Some(lock) = Self::try_acquire(sandbox)? {
                return Ok(lock);
            }
            std::thread::sleep(poll_interval);
        }

        warn!("timeout waiting for orchestrator lock after {:?}", start.elapsed());
        Err(SgError::LockTimeout(format!(
            "orchestrator lock not released within {timeout:?}"
        )))
    }

    /// Read the recorded holder, if any.
    pub fn status(sandbox: &Sandbox) -> Result<Option<LockHolder>> {
        let lock_path = sandbox.root().join(LOCK_PATH);
        let Ok(content) = fs::read_to_string(&lock_path) else {
            return Ok(None);
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for OrchestratorLock {
    fn drop(&mut self) {
        if let Err(e) = self.lock_file.unlock() {
            debug!("failed to release orchestrator lock: {}", e);
        }
        debug!("released orchestrator lock");
    }
}

/// Information about the current lock holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub hostname: String,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

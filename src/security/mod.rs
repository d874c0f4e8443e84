//! Write confinement and process-level locking.

pub mod lock;
pub mod sandbox;

pub use lock::{LockHolder, OrchestratorLock};
pub use sandbox::{ADMIN_WRITABLE, AGENT_WRITABLE, PathViolation, Sandbox, validate_identifier};

//! Persistence for proposal records and the skill manifest.
//!
//! Both are YAML documents under the data root, rewritten atomically through
//! the sandbox.

pub mod manifest;
pub mod proposal;
pub mod store;

pub use manifest::{MANIFEST_PATH, Manifest, ManifestEntry};
pub use proposal::{HistoryEntry, ProposalRecord, ProposalSpec, ToolSpec, WorkingContext};
pub use store::{PROPOSALS_DIR, ProposalStore};

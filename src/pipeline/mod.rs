//! The proposal pipeline.
//!
//! ```text
//! new → discovered → implementation → agent-review → human-review → accepted
//!   └──────────────┴── any failure or denied gate ──┴────────→ rejected
//! accepted → removed (operator command only)
//! ```
//!
//! Each forward step runs an action from [`actions`], consults the
//! [`GatePolicy`] and records the decided [`transition::Outcome`].

pub mod actions;
pub mod gate;
pub mod install;
pub mod orchestrator;
pub mod service;
pub mod status;
pub mod transition;

pub use gate::{GateMode, GatePolicy};
pub use install::{FsPackageWriter, Installed, Installer, PackageWriter};
pub use orchestrator::{CLI_ACTOR, Orchestrator, SERVICE_ACTOR, ScanReport, format_table};
pub use service::{Command, Service, stdin_lines};
pub use status::Status;
pub use transition::{Approval, Outcome};

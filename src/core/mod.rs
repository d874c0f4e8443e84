//! Runtime core: capabilities, events, skills, registry and kernel.

pub mod background;
pub mod capability;
pub mod event;
pub mod kernel;
pub mod registry;
pub mod skill;

pub use capability::{Capability, CapabilitySet, EventPolicy};
pub use event::{Event, SkillResult};
pub use kernel::{Kernel, KernelContext, KernelSettings};
pub use registry::{SkillCatalog, SkillRegistry};
pub use skill::{Skill, SkillInfo, Tool};

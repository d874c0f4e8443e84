//! Collaborators the pipeline governs but does not trust: code generators
//! and the human approval channel.

pub mod approval;
pub mod generator;

pub use approval::{ApprovalChannel, CliApprover, FixedApprover, Notice};
pub use generator::{
    CodeGenerator, CommandGenerator, DisabledGenerator, Generation, HttpGenerator, SystemContext,
    build_prompt, clean_code, from_config, interpret,
};

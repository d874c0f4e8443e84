//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use std::sync::Arc;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::collab::{self, ApprovalChannel, SystemContext};
use crate::error::Result;
use crate::pipeline::Orchestrator;

pub mod agent;
pub mod analyze;
pub mod approve;
pub mod completions;
pub mod init;
pub mod list;
pub mod propose;
pub mod remove;
pub mod run;

/// Dispatch a command to its handler. No subcommand runs the service.
pub fn run(ctx: &AppContext, command: Option<&Commands>) -> Result<()> {
    match command {
        None => run::run(ctx, &run::RunArgs::default()),
        Some(Commands::Init(args)) => init::run(ctx, args),
        Some(Commands::Run(args)) => run::run(ctx, args),
        Some(Commands::List(args)) => list::run(ctx, args),
        Some(Commands::Approve(args)) => approve::run(ctx, args),
        Some(Commands::Remove(args)) => remove::run(ctx, args),
        Some(Commands::Propose(args)) => propose::run(ctx, args),
        Some(Commands::Analyze(args)) => analyze::run(ctx, args),
        Some(Commands::Agent(args)) => agent::run(ctx, args),
        Some(Commands::Completions(args)) => completions::run(args),
    }
}

/// Orchestrator wired from the loaded configuration.
pub(crate) fn build_orchestrator(ctx: &AppContext, approver: Arc<dyn ApprovalChannel>) -> Result<Orchestrator> {
    let config = &ctx.config;
    Ok(Orchestrator::new(ctx.admin_store()?, approver)
        .with_gates(config.gates)
        .with_generator(collab::from_config(&config.generator)?)
        .with_system(SystemContext::from(&config.system)))
}

//! skillgate remove - Uninstall an accepted skill

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::collab::FixedApprover;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Proposal id or slug of the installed skill
    pub target: String,
}

pub fn run(ctx: &AppContext, args: &RemoveArgs) -> Result<()> {
    let orchestrator = super::build_orchestrator(ctx, Arc::new(FixedApprover::denying()))?;
    let message = orchestrator.remove(&args.target)?;

    if ctx.output_format.is_machine_readable() {
        return emit_robot(&robot_ok(json!({
            "target": args.target,
            "message": message,
        })));
    }

    if ctx.output_format.use_colors() {
        println!("{} {message}", "✓".green().bold());
        println!("  {}", "Restart the agent to drop the skill.".dimmed());
    } else {
        println!("✓ {message}");
        println!("  Restart the agent to drop the skill.");
    }
    Ok(())
}

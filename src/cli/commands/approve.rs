//! skillgate approve - Approve a proposal and install its skill

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::collab::FixedApprover;
use crate::error::Result;

#[derive(Args, Debug)]
pub struct ApproveArgs {
    /// Proposal id or slug
    pub target: String,

    /// Approve even when the proposal is not waiting in human-review
    #[arg(long)]
    pub force: bool,
}

pub fn run(ctx: &AppContext, args: &ApproveArgs) -> Result<()> {
    let channel = Arc::new(FixedApprover::denying());
    let orchestrator = super::build_orchestrator(ctx, channel.clone())?;
    let message = orchestrator.approve(&args.target, args.force)?;
    let notices: Vec<String> = channel.notices().into_iter().map(|n| n.message).collect();

    if ctx.output_format.is_machine_readable() {
        let mut response = robot_ok(json!({
            "target": args.target,
            "forced": args.force,
            "message": message,
        }));
        response.warnings = notices;
        return emit_robot(&response);
    }

    let mark = if ctx.output_format.use_colors() {
        "✓".green().bold().to_string()
    } else {
        "✓".to_string()
    };
    println!("{mark} {message}");
    for notice in notices {
        println!("  {notice}");
    }
    Ok(())
}

//! skillgate run - Run the proposal pipeline service

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::collab::CliApprover;
use crate::error::Result;
use crate::pipeline::{Service, stdin_lines};
use crate::security::OrchestratorLock;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Process pending proposals once and exit
    #[arg(long)]
    pub once: bool,
}

pub fn run(ctx: &AppContext, args: &RunArgs) -> Result<()> {
    let sandbox = ctx.admin_sandbox()?;
    let lock = OrchestratorLock::acquire(&sandbox)?;
    info!(root = %ctx.root.display(), lock = %lock.path().display(), "orchestrator lock held");

    let lines = stdin_lines();
    let approver = Arc::new(CliApprover::new(lines.clone()));
    let orchestrator = super::build_orchestrator(ctx, approver)?;

    if args.once {
        let report = orchestrator.scan_once()?;
        if ctx.output_format.is_machine_readable() {
            return emit_robot(&robot_ok(json!({
                "processed": report.processed,
                "failed": report.failed,
            })));
        }
        let summary = format!(
            "Processed {} proposal(s), {} failed",
            report.processed, report.failed
        );
        if ctx.output_format.use_colors() && report.failed > 0 {
            println!("{}", summary.yellow());
        } else {
            println!("{summary}");
        }
        return Ok(());
    }

    println!(
        "skillgate pipeline service - root: {} (polling every {})",
        ctx.root.display(),
        humantime_serde::re::humantime::format_duration(ctx.config.pipeline.poll_interval)
    );
    Service::new(&orchestrator, lines, ctx.config.pipeline.poll_interval).run()
}

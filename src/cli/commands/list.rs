//! skillgate list - List proposals and their pipeline status

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::collab::FixedApprover;
use crate::error::Result;
use crate::pipeline::{Status, format_table};
use crate::storage::ProposalRecord;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show proposals in this status (e.g. human-review, accepted)
    #[arg(long, short)]
    pub status: Option<Status>,
}

pub fn run(ctx: &AppContext, args: &ListArgs) -> Result<()> {
    let orchestrator = super::build_orchestrator(ctx, Arc::new(FixedApprover::denying()))?;
    let records = orchestrator.list(args.status)?;

    if ctx.output_format.is_machine_readable() {
        list_robot(&records)
    } else {
        list_human(ctx, &records, args);
        Ok(())
    }
}

fn list_human(ctx: &AppContext, records: &[ProposalRecord], args: &ListArgs) {
    println!("{}", format_table(records));
    if records.is_empty() {
        if args.status.is_none() {
            println!();
            println!("  Nothing proposed yet. Create one with: skillgate propose \"...\"");
        }
        return;
    }

    let waiting = records
        .iter()
        .filter(|r| r.status == Status::HumanReview)
        .count();
    let summary = format!("  {} proposal(s)", records.len());
    if ctx.output_format.use_colors() {
        println!("\n{}", summary.dimmed());
        if waiting > 0 {
            println!("  {} awaiting approval", waiting.to_string().yellow().bold());
        }
    } else {
        println!("\n{summary}");
        if waiting > 0 {
            println!("  {waiting} awaiting approval");
        }
    }
}

fn list_robot(records: &[ProposalRecord]) -> Result<()> {
    let proposals: Vec<_> = records
        .iter()
        .map(|record| {
            json!({
                "id": record.id(),
                "slug": record.slug(),
                "name": record.display_name(),
                "status": record.status,
                "created_at": record.created_at(),
                "capabilities": record.proposal.capabilities,
                "rejection_reason": record.rejection_reason,
                "rejection_reason_type": record.rejection_reason_type,
            })
        })
        .collect();
    emit_robot(&robot_ok(json!({
        "count": proposals.len(),
        "proposals": proposals,
    })))
}

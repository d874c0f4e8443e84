//! skillgate propose - Write a new proposal for the pipeline

use std::path::PathBuf;

use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::AppContext;
use crate::cli::output::{emit_robot, robot_ok};
use crate::error::{Result, SgError};
use crate::pipeline::CLI_ACTOR;
use crate::skills::proposer::{is_feasible, write_proposal};

#[derive(Args, Debug)]
pub struct ProposeArgs {
    /// What the skill should do, or a JSON proposal spec
    #[arg(trailing_var_arg = true)]
    pub request: Vec<String>,

    /// Read the request from a file instead
    #[arg(long, short, conflicts_with = "request")]
    pub file: Option<PathBuf>,

    /// Profile recorded on the proposal (default: agent.profile)
    #[arg(long)]
    pub profile: Option<String>,
}

pub fn run(ctx: &AppContext, args: &ProposeArgs) -> Result<()> {
    let request = match &args.file {
        Some(path) => std::fs::read_to_string(path)?,
        None => args.request.join(" "),
    };
    if request.trim().is_empty() {
        return Err(SgError::Validation(
            "Nothing to propose: pass a description or --file".to_string(),
        ));
    }
    let profile = args.profile.as_deref().unwrap_or(&ctx.config.agent.profile);

    let sandbox = ctx.agent_sandbox()?;
    let record = write_proposal(&sandbox, &request, profile, CLI_ACTOR, Utc::now())?;
    let path = record
        .location
        .as_ref()
        .map(|p| sandbox.root().join(p))
        .unwrap_or_default();

    if ctx.output_format.is_machine_readable() {
        return emit_robot(&robot_ok(json!({
            "id": record.id(),
            "slug": record.slug(),
            "path": path.display().to_string(),
            "capabilities": record.proposal.capabilities,
            "feasible": is_feasible(&record),
        })));
    }

    let slug = if ctx.output_format.use_colors() {
        record.slug().bold().to_string()
    } else {
        record.slug().to_string()
    };
    println!("Proposal {slug} written to {}", path.display());
    if record.proposal.capabilities.is_empty() {
        println!("  No capabilities recognised; the pipeline will reject it at validation.");
    } else {
        println!("  Capabilities: {}", record.proposal.capabilities.join(", "));
    }
    if !is_feasible(&record) {
        println!("  NOTE: may not be feasible on this system");
    }
    Ok(())
}

//! skillgate init - Create the data layout and the core skill manifest

use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde_json::json;

use crate::app::{AppContext, LOCAL_ROOT_DIR};
use crate::cli::output::{HumanLayout, emit_human, emit_robot, robot_ok};
use crate::error::Result;
use crate::security::{Sandbox, validate_identifier};
use crate::skills::builtin_manifest;
use crate::storage::{MANIFEST_PATH, Manifest, PROPOSALS_DIR};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Initialize ./.skillgate in the current directory instead of the resolved root
    #[arg(long)]
    pub local: bool,
}

/// What `init` did to a data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub root: PathBuf,
    pub created_manifest: bool,
    pub added: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &InitArgs) -> Result<()> {
    let target = if args.local {
        std::env::current_dir()?.join(LOCAL_ROOT_DIR)
    } else {
        ctx.root.clone()
    };

    let report = initialize(&target, &ctx.config.agent.profile)?;

    if ctx.output_format.is_machine_readable() {
        return emit_robot(&robot_ok(json!({
            "root": report.root.display().to_string(),
            "created_manifest": report.created_manifest,
            "added": report.added,
        })));
    }

    let colors = ctx.output_format.use_colors();
    let mut layout = HumanLayout::new().plain(!colors);
    layout
        .title("Initializing skillgate")
        .kv("Root", &report.root.display().to_string())
        .kv("Manifest", &report.root.join(MANIFEST_PATH).display().to_string());
    if report.added.is_empty() {
        layout.kv("Core skills", "already present");
    } else {
        layout.blank().section("Added to manifest");
        for module in &report.added {
            layout.bullet(module);
        }
    }
    emit_human(layout);

    let mark = if colors {
        "✓".green().bold().to_string()
    } else {
        "✓".to_string()
    };
    println!();
    println!("{mark} Initialized at {}", report.root.display());
    println!();
    println!("Start the pipeline with:");
    println!("  skillgate run");
    Ok(())
}

/// Create `proposals/`, `skills/` and the profile memory directory, and
/// make sure the manifest lists every core skill. Safe to repeat.
pub fn initialize(root: &Path, profile: &str) -> Result<InitReport> {
    validate_identifier(profile)?;
    let admin = Sandbox::admin(root)?;
    let agent = Sandbox::agent(root)?;

    admin.create_dir(PROPOSALS_DIR)?;
    admin.create_dir("skills")?;
    agent.create_dir(Path::new("profiles").join(profile).join("memory"))?;

    let created_manifest = !Manifest::exists(admin.root());
    let mut manifest = Manifest::load_or_default(admin.root())?;
    let mut added = Vec::new();
    for entry in builtin_manifest().skills {
        if !manifest.contains_module(&entry.module) {
            added.push(entry.module.clone());
            manifest.add(entry)?;
        }
    }
    if created_manifest || !added.is_empty() {
        manifest.save(&admin)?;
    }

    Ok(InitReport {
        root: admin.root().to_path_buf(),
        created_manifest,
        added,
    })
}

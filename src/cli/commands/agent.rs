//! skillgate agent - Boot the kernel with the manifest's skills

use clap::Args;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::core::{Kernel, KernelSettings, SkillRegistry};
use crate::error::Result;
use crate::security::validate_identifier;
use crate::skills::{builtin_catalog, builtin_manifest};
use crate::storage::Manifest;

#[derive(Args, Debug)]
pub struct AgentArgs {
    /// Profile whose memory the session uses (default: agent.profile)
    #[arg(long, short)]
    pub profile: Option<String>,
}

pub fn run(ctx: &AppContext, args: &AgentArgs) -> Result<()> {
    let profile = args
        .profile
        .clone()
        .unwrap_or_else(|| ctx.config.agent.profile.clone());
    validate_identifier(&profile)?;

    let manifest = if Manifest::exists(&ctx.root) {
        Manifest::load(&ctx.root)?
    } else {
        warn!(root = %ctx.root.display(), "no manifest found; loading core skills only (run `skillgate init`)");
        builtin_manifest()
    };

    let registry = SkillRegistry::load(&manifest, &builtin_catalog());
    info!(skills = registry.len(), profile = %profile, "booting agent");

    let settings = KernelSettings {
        profile_id: profile,
        max_dispatch_depth: ctx.config.agent.max_dispatch_depth,
        ..KernelSettings::default()
    };
    Kernel::start(registry, ctx.agent_sandbox()?, settings)?.run()
}

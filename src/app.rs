use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::{Result, SgError};
use crate::security::Sandbox;
use crate::storage::ProposalStore;

/// Marker directory that makes a project-local data root.
pub const LOCAL_ROOT_DIR: &str = ".skillgate";

pub struct AppContext {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
    pub output_format: OutputFormat,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => Self::find_root()?,
        };
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| default_config_path(&root));
        let config = Config::load(cli.config.as_deref(), &root)?;

        Ok(Self {
            root,
            config_path,
            config,
            robot_mode: cli.robot,
            output_format: cli.output_format(),
            verbosity: cli.verbose,
        })
    }

    fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("SKILLGATE_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, LOCAL_ROOT_DIR) {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| SgError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("skillgate"))
    }

    /// Sandbox for administrative writes (`proposals/`, `skills/`).
    pub fn admin_sandbox(&self) -> Result<Sandbox> {
        Sandbox::admin(&self.root)
    }

    /// Sandbox for agent writes (`profiles/`, `proposals/`).
    pub fn agent_sandbox(&self) -> Result<Sandbox> {
        Sandbox::agent(&self.root)
    }

    /// Proposal store rooted in the admin sandbox with the configured
    /// implementations directory.
    pub fn admin_store(&self) -> Result<ProposalStore> {
        Ok(ProposalStore::new(self.admin_sandbox()?)
            .with_implementations_dir(self.config.pipeline.implementations_dir.clone()))
    }
}

fn default_config_path(root: &Path) -> PathBuf {
    if root.ends_with(LOCAL_ROOT_DIR) {
        root.join("config.toml")
    } else {
        dirs::config_dir()
            .unwrap_or_else(|| root.to_path_buf())
            .join("skillgate/config.toml")
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_dir())
}

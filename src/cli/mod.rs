//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;

/// skillgate - Govern how an agent acquires new skills
#[derive(Parser, Debug)]
#[command(name = "skillgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Output format (human, json, plain)
    #[arg(long, short = 'O', global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/skillgate/config.toml)
    #[arg(long, global = true, env = "SKILLGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data root holding proposals/, skills/ and profiles/
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Without a subcommand the pipeline service runs.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Effective output format. `--robot` wins over `--output-format`.
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_args(self.robot, self.output_format)
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data layout and the core skill manifest
    Init(commands::init::InitArgs),

    /// Run the proposal pipeline service (default)
    Run(commands::run::RunArgs),

    /// List proposals
    List(commands::list::ListArgs),

    /// Approve a proposal waiting for human review and install it
    Approve(commands::approve::ApproveArgs),

    /// Uninstall an accepted skill
    Remove(commands::remove::RemoveArgs),

    /// Write a new proposal from a description or a JSON spec
    Propose(commands::propose::ProposeArgs),

    /// Run the static safety analyzer on a source file
    Analyze(commands::analyze::AnalyzeArgs),

    /// Start the agent with the skills in the manifest
    Agent(commands::agent::AgentArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["skillgate", "-vv", "--root", "/tmp/x"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["skillgate", "list", "--status", "accepted", "--robot"]).unwrap();
        assert!(cli.robot);
        assert_eq!(cli.output_format(), OutputFormat::Json);
        assert!(matches!(cli.command, Some(Commands::List(_))));
    }
}

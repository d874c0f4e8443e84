//! skillgate - gated skill acquisition for an agent
//!
//! Proposals move through validation, generation, static analysis and
//! approval before a skill is installed into the manifest.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use skillgate::Result;
use skillgate::app::AppContext;
use skillgate::cli::output::{emit_robot, robot_error_structured};
use skillgate::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.robot {
                // Robot mode: JSON error output to stdout
                if emit_robot(&robot_error_structured(&e)).is_err() {
                    println!("{{\"error\":true}}");
                }
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if let Some(Commands::Completions(args)) = &cli.command {
        return skillgate::cli::commands::completions::run(args);
    }
    let ctx = AppContext::from_cli(cli)?;
    skillgate::cli::commands::run(&ctx, cli.command.as_ref())
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,skillgate=info",
        1 => "info,skillgate=debug",
        2 => "debug,skillgate=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

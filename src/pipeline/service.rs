//! The long-running polling loop with interactive operator commands.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info};

use crate::error::Result;
use crate::pipeline::orchestrator::{Orchestrator, format_table};
use crate::pipeline::status::Status;

pub const HELP: &str = "  Available commands:
    list [STATUS]                List proposals (filter by status)
    approve <ID|SLUG> [--force]  Approve a proposal
    remove <ID|SLUG>             Remove an installed skill
    help                         Show this help
    quit                         Stop the service";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List(Option<String>),
    Approve { target: String, force: bool },
    Remove { target: String },
    Help,
    Quit,
    /// Known command with missing arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
    Empty,
}

impl Command {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(first) = parts.first() else {
            return Self::Empty;
        };
        match first.to_lowercase().as_str() {
            "list" => Self::List(parts.get(1).map(|s| (*s).to_string())),
            "approve" => match parts.get(1) {
                Some(target) => Self::Approve {
                    target: (*target).to_string(),
                    force: parts[2..].contains(&"--force"),
                },
                None => Self::Usage("approve <ID|SLUG> [--force]"),
            },
            "remove" => match parts.get(1) {
                Some(target) => Self::Remove {
                    target: (*target).to_string(),
                },
                None => Self::Usage("remove <ID|SLUG>"),
            },
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Spawn a thread forwarding stdin lines into a channel.
///
/// The channel disconnects at end of input.
#[must_use]
pub fn stdin_lines() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            debug!("stdin closed");
        });
    if let Err(err) = spawned {
        error!(error = %err, "failed to spawn stdin reader");
    }
    rx
}

pub struct Service<'a> {
    orchestrator: &'a Orchestrator,
    lines: Receiver<String>,
    poll_interval: Duration,
    out: Box<dyn Write + 'a>,
}

impl<'a> Service<'a> {
    #[must_use]
    pub fn new(orchestrator: &'a Orchestrator, lines: Receiver<String>, poll_interval: Duration) -> Self {
        Self {
            orchestrator,
            lines,
            poll_interval,
            out: Box::new(io::stdout()),
        }
    }

    #[must_use]
    pub fn with_output(mut self, out: Box<dyn Write + 'a>) -> Self {
        self.out = out;
        self
    }

    /// Scan, then wait up to one poll interval for a command. Repeats until
    /// `quit`.
    pub fn run(&mut self) -> Result<()> {
        info!(
            dir = %self.orchestrator.store().dir().display(),
            interval = ?self.poll_interval,
            "pipeline service started"
        );
        writeln!(self.out, "  Type 'help' for available commands.\n")?;
        self.out.flush()?;

        loop {
            match self.orchestrator.scan_once() {
                Ok(report) if report.processed > 0 => {
                    debug!(processed = report.processed, failed = report.failed, "scan complete");
                }
                Ok(_) => {}
                Err(err) => error!(error = %err, "scan failed"),
            }

            match self.lines.recv_timeout(self.poll_interval) {
                Ok(line) => {
                    if !self.execute(&Command::parse(&line))? {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("command input closed; continuing to poll");
                    self.lines = crossbeam_channel::never();
                }
            }
        }

        info!("pipeline service stopped");
        Ok(())
    }

    /// Run one command. Returns `false` when the loop should stop.
    pub fn execute(&mut self, command: &Command) -> Result<bool> {
        match command {
            Command::List(filter) => {
                let status = match filter.as_deref().map(str::parse::<Status>).transpose() {
                    Ok(status) => status,
                    Err(err) => {
                        writeln!(self.out, "  Error: {err}")?;
                        return Ok(true);
                    }
                };
                match self.orchestrator.list(status) {
                    Ok(records) => writeln!(self.out, "{}", format_table(&records))?,
                    Err(err) => writeln!(self.out, "  Error: {err}")?,
                }
            }
            Command::Approve { target, force } => match self.orchestrator.approve(target, *force) {
                Ok(message) => writeln!(self.out, "  {message}")?,
                Err(err) => writeln!(self.out, "  Error: {err}")?,
            },
            Command::Remove { target } => match self.orchestrator.remove(target) {
                Ok(message) => writeln!(self.out, "  {message}")?,
                Err(err) => writeln!(self.out, "  Error: {err}")?,
            },
            Command::Help => writeln!(self.out, "{HELP}")?,
            Command::Quit => return Ok(false),
            Command::Usage(usage) => writeln!(self.out, "  Usage: {usage}")?,
            Command::Unknown(cmd) => writeln!(
                self.out,
                "  Unknown command: '{cmd}'. Type 'help' for available commands."
            )?,
            Command::Empty => {}
        }
        self.out.flush()?;
        Ok(true)
    }
}

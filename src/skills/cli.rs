//! Terminal driver: reads user lines, dispatches `user_input`, prints replies.

use std::io::{self, BufRead, BufReader, Write};

use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::core::capability::{self, CapabilitySet, USER_INPUT, USER_OUTPUT};
use crate::core::event::{self, Event};
use crate::core::kernel::KernelContext;
use crate::core::skill::Skill;
use crate::error::Result;

pub const CLI_NAME: &str = "cli";

const FALLBACK_REPLY: &str = "I'm having trouble processing your request. Please try again.";

pub struct CliSkill {
    input: Mutex<Box<dyn BufRead + Send>>,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Default for CliSkill {
    fn default() -> Self {
        Self::with_io(Box::new(BufReader::new(io::stdin())), Box::new(io::stdout()))
    }
}

impl CliSkill {
    #[must_use]
    pub fn with_io(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            input: Mutex::new(input),
            output: Mutex::new(output),
        }
    }

    fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        match self.input.lock().read_line(&mut line)? {
            0 => Ok(None),
            _ => Ok(Some(line)),
        }
    }
}

impl Skill for CliSkill {
    fn name(&self) -> &str {
        CLI_NAME
    }

    fn description(&self) -> &str {
        "Communicate with the user via text in the terminal."
    }

    fn capabilities(&self) -> CapabilitySet {
        capability::capability_set([USER_INPUT, USER_OUTPUT]).unwrap_or_default()
    }

    fn run(&self, ctx: &KernelContext) -> Result<()> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let mut history: Vec<Value> = Vec::new();
        {
            let mut out = self.output.lock();
            writeln!(out, "skillgate agent - profile: {}", ctx.profile_id())?;
            writeln!(out, "Type 'quit' or 'exit' to end the session.\n")?;
        }

        loop {
            {
                let mut out = self.output.lock();
                write!(out, "You: ")?;
                out.flush()?;
            }
            let Some(line) = self.read_line()? else {
                writeln!(self.output.lock())?;
                break;
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            if matches!(text.to_lowercase().as_str(), "quit" | "exit") {
                writeln!(self.output.lock(), "Goodbye!")?;
                break;
            }

            history.push(json!({ "role": "user", "content": text }));
            let turn = Event::new(event::USER_INPUT, text, CLI_NAME)
                .with_session(session_id.clone())
                .with_profile(ctx.profile_id())
                .with_metadata("history", Value::Array(history.clone()));

            let reply = match ctx.dispatch(&turn) {
                Some(result) if result.success => result.output,
                _ => FALLBACK_REPLY.to_string(),
            };
            history.push(json!({ "role": "assistant", "content": reply }));
            writeln!(self.output.lock(), "Assistant: {reply}\n")?;
        }
        Ok(())
    }
}

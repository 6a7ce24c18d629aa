//! The `shell` escape: run the rest of the line with `sh -c`.
//!
//! Disabled unless the session allows it.

use std::process;

use fsrepl_types::error::{ReplError, Result};

use crate::interpreter::{Command, CommandOutput, CommandRegistry};
use crate::session::Session;

struct ShellCmd;
impl Command for ShellCmd {
    fn name(&self) -> &str {
        "shell"
    }
    fn description(&self) -> &str {
        "Run a shell command and print its exit code"
    }
    fn usage(&self) -> &str {
        "shell COMMAND..."
    }
    fn category(&self) -> &str {
        "system"
    }
    fn arity(&self) -> usize {
        1
    }
    fn literal_tail(&self) -> bool {
        true
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        if !session.allow_shell {
            return Err(ReplError::ShellDisabled);
        }
        let command = args[0];
        log::debug!("sh -c '{command}'");
        let exit = process::Command::new("sh").arg("-c").arg(command).status()?;
        // Killed by a signal: no exit code.
        let code = exit.code().unwrap_or(-1);
        log::debug!("sh -c '{command}' rc = {code}");
        if code != 0 {
            log::error!("sh -c '{command}' exited with {code}");
        }
        Ok(CommandOutput::Text(code.to_string()))
    }
}

/// Register the `shell` command.
pub fn register_shell_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(ShellCmd));
}

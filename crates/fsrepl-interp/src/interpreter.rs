//! Command trait, registry, and dispatch.
//!
//! Commands are trait objects registered by name. The registry validates the
//! argument count of a [`Statement`] before the command runs, so a command
//! never sees the wrong number of arguments and a rejected statement never
//! reaches storage.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, Write};

use fsrepl_types::error::{ReplError, Result, StorageResult};

use crate::parser::{Grammar, Statement};
use crate::session::Session;

/// Output produced by a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    /// Nothing is printed.
    None,
    /// Index of a newly allocated descriptor.
    Descriptor(usize),
    /// A byte count.
    Count(usize),
    /// Length line followed by the raw bytes.
    Data(Vec<u8>),
    /// Length line, then the bytes and a newline.
    Value(Vec<u8>),
    /// A count line followed by one line per item.
    Listing { count: usize, lines: Vec<String> },
    /// A single line of text.
    Text(String),
}

impl CommandOutput {
    /// Write the output the way the interpreter prints it.
    pub fn render<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Descriptor(n) | Self::Count(n) => writeln!(out, "{n}"),
            Self::Data(bytes) => {
                writeln!(out, "{}", bytes.len())?;
                out.write_all(bytes)
            },
            Self::Value(bytes) => {
                writeln!(out, "{}", bytes.len())?;
                out.write_all(bytes)?;
                writeln!(out)
            },
            Self::Listing { count, lines } => {
                writeln!(out, "{count}")?;
                for line in lines {
                    writeln!(out, "{line}")?;
                }
                Ok(())
            },
            Self::Text(text) => writeln!(out, "{text}"),
        }
    }
}

/// A single executable command.
pub trait Command {
    /// The command name (what the script says).
    fn name(&self) -> &str;

    /// One-line description for `--help`.
    fn description(&self) -> &str;

    /// Usage string (e.g. "read FD OFFSET LEN").
    fn usage(&self) -> &str;

    /// Command category for grouping in help output.
    fn category(&self) -> &str {
        "general"
    }

    /// Exact number of arguments the command takes.
    fn arity(&self) -> usize;

    /// Whether the last argument is the verbatim rest of the line.
    fn literal_tail(&self) -> bool {
        false
    }

    /// Run with exactly [`Command::arity`] arguments.
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput>;
}

/// Registry of available commands with dispatch.
pub struct CommandRegistry {
    commands: HashMap<String, Box<dyn Command>>,
}

impl CommandRegistry {
    /// Create an empty command registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a command. Replaces any existing command with the same name.
    pub fn register(&mut self, cmd: Box<dyn Command>) {
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Command> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    /// Resolve, arity-check, and run a statement.
    pub fn execute(&self, stmt: &Statement, session: &mut Session<'_>) -> Result<CommandOutput> {
        let name = stmt.command();
        let cmd = self
            .get(name)
            .ok_or_else(|| ReplError::UnknownCommand(name.to_string()))?;
        let args = stmt.args();
        if args.len() != cmd.arity() {
            return Err(ReplError::Arity {
                command: name.to_string(),
                expected: cmd.arity(),
                got: args.len(),
            });
        }
        cmd.execute(&args, session)
    }

    /// List all registered commands as `(name, description)`, sorted by name.
    pub fn list_commands(&self) -> Vec<(&str, &str)> {
        let mut cmds: Vec<(&str, &str)> = self
            .commands
            .values()
            .map(|c| (c.name(), c.description()))
            .collect();
        cmds.sort_by_key(|(name, _)| *name);
        cmds
    }

    /// Usage and description of every command, grouped by category.
    pub fn help_text(&self) -> String {
        let mut cmds: Vec<&dyn Command> = self.commands.values().map(|c| c.as_ref()).collect();
        cmds.sort_by(|a, b| (a.category(), a.name()).cmp(&(b.category(), b.name())));
        let width = cmds.iter().map(|c| c.usage().len()).max().unwrap_or(0);
        let mut out = String::new();
        let mut category = "";
        for cmd in cmds {
            if cmd.category() != category {
                category = cmd.category();
                out.push_str(&format!("{category}:\n"));
            }
            out.push_str(&format!("  {:width$}  {}\n", cmd.usage(), cmd.description()));
        }
        out
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for CommandRegistry {
    fn tail_position(&self, command: &str) -> Option<usize> {
        self.get(command)
            .filter(|c| c.literal_tail())
            .map(|c| c.arity().saturating_sub(1))
    }
}

// -- Typed argument helpers --

/// Parse a complete decimal `u64`. Zero is a valid value.
pub fn parse_u64(token: &str) -> Result<u64> {
    token
        .parse()
        .map_err(|_| ReplError::BadNumber(token.to_string()))
}

/// Parse an octal permission mode no larger than `0o7777`.
pub fn parse_mode(token: &str) -> Result<u32> {
    u32::from_str_radix(token, 8)
        .ok()
        .filter(|&mode| mode <= 0o7777)
        .ok_or_else(|| ReplError::BadMode(token.to_string()))
}

/// Parse a count that must fit in memory.
pub fn parse_usize(token: &str) -> Result<usize> {
    usize::try_from(parse_u64(token)?).map_err(|_| ReplError::BadNumber(token.to_string()))
}

/// Status code of a storage result as logged after each call.
pub(crate) fn rc<T>(result: &StorageResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}

/// Status code of an interpreter result.
pub(crate) fn status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.status(),
    }
}

const PREVIEW_LEN: usize = 45;

/// First 45 bytes of `text` for log lines, with `...` when cut.
pub(crate) fn preview(text: &str) -> Cow<'_, str> {
    if text.len() <= PREVIEW_LEN {
        return Cow::Borrowed(text);
    }
    let mut cut = PREVIEW_LEN;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    Cow::Owned(format!("{}...", &text[..cut]))
}

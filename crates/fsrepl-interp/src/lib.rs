//! Line-oriented command interpreter over a storage interface.
//!
//! A script is replayed one statement per line. The parser splits each line
//! into a command and arguments, the registry validates and dispatches it,
//! and commands act on a [`Session`] holding the storage and the descriptor
//! tables of open files and directories.

mod commands;
pub mod dir_commands;
pub mod driver;
pub mod file_commands;
mod interpreter;
pub mod parser;
pub mod path_commands;
pub mod session;
pub mod shell_commands;
pub mod table;
pub mod xattr_commands;

#[cfg(test)]
mod test_utils;

/// Register all built-in commands into a registry.
pub use commands::register_builtins;
/// Replay a script through a session.
pub use driver::run;
/// A single executable command trait.
pub use interpreter::Command;
/// Output produced by a command.
pub use interpreter::CommandOutput;
/// Registry of available commands with dispatch.
pub use interpreter::CommandRegistry;
/// Typed argument parsers shared by commands.
pub use interpreter::{parse_mode, parse_u64, parse_usize};
/// Parsed statement and parsing entry points.
pub use parser::{Grammar, Parsed, PlainGrammar, Statement, parse_line, parse_statement};
/// Interpreter session state.
pub use session::Session;
/// Bounded descriptor table.
pub use table::DescriptorTable;

//! Directory commands: opendir, readdir, closedir, mkdir, rmdir.

use fsrepl_types::error::Result;

use crate::interpreter::{
    Command, CommandOutput, CommandRegistry, parse_mode, parse_u64, parse_usize, rc, status,
};
use crate::session::Session;

// ---------------------------------------------------------------------------
// opendir
// ---------------------------------------------------------------------------

struct OpendirCmd;
impl Command for OpendirCmd {
    fn name(&self) -> &str {
        "opendir"
    }
    fn description(&self) -> &str {
        "Open a directory and print its descriptor"
    }
    fn usage(&self) -> &str {
        "opendir PATH"
    }
    fn category(&self) -> &str {
        "directory"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        log::debug!("opendir('{path}')");
        let result = session.storage.opendir(path);
        log::debug!("opendir('{path}') rc = {}", rc(&result));
        let index = session.insert_dir(result?)?;
        Ok(CommandOutput::Descriptor(index))
    }
}

// ---------------------------------------------------------------------------
// readdir
// ---------------------------------------------------------------------------

struct ReaddirCmd;
impl Command for ReaddirCmd {
    fn name(&self) -> &str {
        "readdir"
    }
    fn description(&self) -> &str {
        "List the next batch of at most MAX entries"
    }
    fn usage(&self) -> &str {
        "readdir DFD MAX"
    }
    fn category(&self) -> &str {
        "directory"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let dfd = parse_u64(args[0])?;
        let max = parse_usize(args[1])?;
        let handle = session.dirs.lookup(dfd)?;
        log::debug!("readdir({dfd}, {max})");
        let result = session.storage.readdir(handle, max);
        log::debug!("readdir({dfd}, {max}) rc = {}", rc(&result));
        let entries = result?;
        Ok(CommandOutput::Listing {
            count: entries.len(),
            lines: entries.iter().map(ToString::to_string).collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// closedir
// ---------------------------------------------------------------------------

struct ClosedirCmd;
impl Command for ClosedirCmd {
    fn name(&self) -> &str {
        "closedir"
    }
    fn description(&self) -> &str {
        "Close a directory descriptor"
    }
    fn usage(&self) -> &str {
        "closedir DFD"
    }
    fn category(&self) -> &str {
        "directory"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let dfd = parse_u64(args[0])?;
        log::debug!("closedir({dfd})");
        let result = session.close_dir(dfd);
        log::debug!("closedir({dfd}) rc = {}", status(&result));
        result.map(|()| CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// mkdir
// ---------------------------------------------------------------------------

struct MkdirCmd;
impl Command for MkdirCmd {
    fn name(&self) -> &str {
        "mkdir"
    }
    fn description(&self) -> &str {
        "Create a directory"
    }
    fn usage(&self) -> &str {
        "mkdir PATH MODE"
    }
    fn category(&self) -> &str {
        "directory"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let mode = parse_mode(args[1])?;
        log::debug!("mkdir('{path}', {mode:o})");
        let result = session.storage.mkdir(path, mode);
        log::debug!("mkdir('{path}', {mode:o}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// rmdir
// ---------------------------------------------------------------------------

struct RmdirCmd;
impl Command for RmdirCmd {
    fn name(&self) -> &str {
        "rmdir"
    }
    fn description(&self) -> &str {
        "Remove an empty directory"
    }
    fn usage(&self) -> &str {
        "rmdir PATH"
    }
    fn category(&self) -> &str {
        "directory"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        log::debug!("rmdir('{path}')");
        let result = session.storage.rmdir(path);
        log::debug!("rmdir('{path}') rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

/// Register the directory commands.
pub fn register_dir_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(OpendirCmd));
    reg.register(Box::new(ReaddirCmd));
    reg.register(Box::new(ClosedirCmd));
    reg.register(Box::new(MkdirCmd));
    reg.register(Box::new(RmdirCmd));
}

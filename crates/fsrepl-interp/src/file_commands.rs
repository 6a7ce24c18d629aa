//! Descriptor-based file commands: create, open, close, read, write, sync, ftrunc.

use fsrepl_storage::OpenFlags;
use fsrepl_types::error::{ReplError, Result};

use crate::interpreter::{
    Command, CommandOutput, CommandRegistry, parse_mode, parse_u64, preview, rc, status,
};
use crate::session::Session;

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

struct CreateCmd;
impl Command for CreateCmd {
    fn name(&self) -> &str {
        "create"
    }
    fn description(&self) -> &str {
        "Create a file, open it read/write, and print its descriptor"
    }
    fn usage(&self) -> &str {
        "create PATH MODE"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let mode = parse_mode(args[1])?;
        log::debug!("create('{path}', {mode:o})");
        let result = session.storage.create(path, mode);
        log::debug!("create('{path}', {mode:o}) rc = {}", rc(&result));
        let index = session.insert_file(result?)?;
        Ok(CommandOutput::Descriptor(index))
    }
}

// ---------------------------------------------------------------------------
// open
// ---------------------------------------------------------------------------

struct OpenCmd;
impl Command for OpenCmd {
    fn name(&self) -> &str {
        "open"
    }
    fn description(&self) -> &str {
        "Open a file with numeric flags and print its descriptor"
    }
    fn usage(&self) -> &str {
        "open PATH FLAGS"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let flags = parse_u64(args[1])?;
        log::debug!("open('{path}', {flags:x})");
        let result = session
            .storage
            .open(path, OpenFlags::from_bits_retain(flags));
        log::debug!("open('{path}', {flags:x}) rc = {}", rc(&result));
        let index = session.insert_file(result?)?;
        Ok(CommandOutput::Descriptor(index))
    }
}

// ---------------------------------------------------------------------------
// close
// ---------------------------------------------------------------------------

struct CloseCmd;
impl Command for CloseCmd {
    fn name(&self) -> &str {
        "close"
    }
    fn description(&self) -> &str {
        "Close a file descriptor"
    }
    fn usage(&self) -> &str {
        "close FD"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let fd = parse_u64(args[0])?;
        log::debug!("close({fd})");
        let result = session.close_file(fd);
        log::debug!("close({fd}) rc = {}", status(&result));
        result.map(|()| CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// read
// ---------------------------------------------------------------------------

struct ReadCmd;
impl Command for ReadCmd {
    fn name(&self) -> &str {
        "read"
    }
    fn description(&self) -> &str {
        "Read up to LEN bytes at OFFSET and print them"
    }
    fn usage(&self) -> &str {
        "read FD OFFSET LEN"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        3
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let fd = parse_u64(args[0])?;
        let offset = parse_u64(args[1])?;
        let len = parse_u64(args[2])?;
        let handle = session.files.lookup(fd)?;
        log::debug!("read({fd}, {offset}, {len})");
        let result = session
            .storage
            .seek(handle, offset)
            .and_then(|_| session.storage.read(handle, len));
        log::debug!("read({fd}, {offset}, {len}) rc = {}", rc(&result));
        Ok(CommandOutput::Data(result?))
    }
}

// ---------------------------------------------------------------------------
// write
// ---------------------------------------------------------------------------

struct WriteCmd;
impl Command for WriteCmd {
    fn name(&self) -> &str {
        "write"
    }
    fn description(&self) -> &str {
        "Write the first LEN bytes of DATA at OFFSET"
    }
    fn usage(&self) -> &str {
        "write FD OFFSET LEN DATA..."
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        4
    }
    fn literal_tail(&self) -> bool {
        true
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let fd = parse_u64(args[0])?;
        let offset = parse_u64(args[1])?;
        let len = parse_u64(args[2])?;
        let data = args[3];
        let payload = usize::try_from(len)
            .ok()
            .and_then(|n| data.as_bytes().get(..n))
            .ok_or_else(|| {
                ReplError::InvalidStatement(format!(
                    "write: length {len} exceeds the {} byte(s) of data",
                    data.len()
                ))
            })?;
        let handle = session.files.lookup(fd)?;
        let shown = preview(data);
        log::debug!("write({fd}, '{shown}', {offset}, {len})");
        let result = session
            .storage
            .seek(handle, offset)
            .and_then(|_| session.storage.write(handle, payload));
        log::debug!("write({fd}, '{shown}', {offset}, {len}) rc = {}", rc(&result));
        Ok(CommandOutput::Count(result?))
    }
}

// ---------------------------------------------------------------------------
// sync
// ---------------------------------------------------------------------------

struct SyncCmd;
impl Command for SyncCmd {
    fn name(&self) -> &str {
        "sync"
    }
    fn description(&self) -> &str {
        "Flush a file descriptor"
    }
    fn usage(&self) -> &str {
        "sync FD"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let fd = parse_u64(args[0])?;
        let handle = session.files.lookup(fd)?;
        log::debug!("fsync({fd})");
        let result = session.storage.fsync(handle);
        log::debug!("fsync({fd}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// ftrunc
// ---------------------------------------------------------------------------

struct FtruncCmd;
impl Command for FtruncCmd {
    fn name(&self) -> &str {
        "ftrunc"
    }
    fn description(&self) -> &str {
        "Truncate an open file to SIZE bytes"
    }
    fn usage(&self) -> &str {
        "ftrunc FD SIZE"
    }
    fn category(&self) -> &str {
        "file"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let fd = parse_u64(args[0])?;
        let size = parse_u64(args[1])?;
        let handle = session.files.lookup(fd)?;
        log::debug!("ftrunc({fd}, {size})");
        let result = session.storage.ftruncate(handle, size);
        log::debug!("ftrunc({fd}, {size}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

/// Register the descriptor-based file commands.
pub fn register_file_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(CreateCmd));
    reg.register(Box::new(OpenCmd));
    reg.register(Box::new(CloseCmd));
    reg.register(Box::new(ReadCmd));
    reg.register(Box::new(WriteCmd));
    reg.register(Box::new(SyncCmd));
    reg.register(Box::new(FtruncCmd));
}

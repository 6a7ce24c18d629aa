//! Path-based metadata commands: access, chmod, chown, stat, trunc, unlink,
//! rename, utime.

use fsrepl_storage::{AccessMode, Timespec};
use fsrepl_types::error::{ReplError, Result};

use crate::interpreter::{Command, CommandOutput, CommandRegistry, parse_mode, parse_u64, rc};
use crate::session::Session;

// ---------------------------------------------------------------------------
// access
// ---------------------------------------------------------------------------

struct AccessCmd;
impl Command for AccessCmd {
    fn name(&self) -> &str {
        "access"
    }
    fn description(&self) -> &str {
        "Check permission bits (octal, 0 = exists)"
    }
    fn usage(&self) -> &str {
        "access PATH MODE"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let mode = parse_mode(args[1])?;
        let wanted =
            AccessMode::from_bits(mode).ok_or_else(|| ReplError::BadMode(args[1].to_string()))?;
        log::debug!("access('{path}', {mode:o})");
        let result = session.storage.access(path, wanted);
        log::debug!("access('{path}', {mode:o}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// chmod
// ---------------------------------------------------------------------------

struct ChmodCmd;
impl Command for ChmodCmd {
    fn name(&self) -> &str {
        "chmod"
    }
    fn description(&self) -> &str {
        "Change permission bits"
    }
    fn usage(&self) -> &str {
        "chmod PATH MODE"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let mode = parse_mode(args[1])?;
        log::debug!("chmod('{path}', {mode:o})");
        let result = session.storage.chmod(path, mode);
        log::debug!("chmod('{path}', {mode:o}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// chown
// ---------------------------------------------------------------------------

struct ChownCmd;
impl Command for ChownCmd {
    fn name(&self) -> &str {
        "chown"
    }
    fn description(&self) -> &str {
        "Change the owner id"
    }
    fn usage(&self) -> &str {
        "chown PATH OWNER"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let owner = parse_u64(args[1])?;
        log::debug!("chown('{path}', {owner})");
        let result = session.storage.chown(path, owner);
        log::debug!("chown('{path}', {owner}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// stat
// ---------------------------------------------------------------------------

struct StatCmd;
impl Command for StatCmd {
    fn name(&self) -> &str {
        "stat"
    }
    fn description(&self) -> &str {
        "Print the attributes of a path on one line"
    }
    fn usage(&self) -> &str {
        "stat PATH"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        log::debug!("stat('{path}')");
        let result = session.storage.stat(path);
        log::debug!("stat('{path}') rc = {}", rc(&result));
        Ok(CommandOutput::Text(result?.to_string()))
    }
}

// ---------------------------------------------------------------------------
// trunc
// ---------------------------------------------------------------------------

struct TruncCmd;
impl Command for TruncCmd {
    fn name(&self) -> &str {
        "trunc"
    }
    fn description(&self) -> &str {
        "Truncate a path to SIZE bytes"
    }
    fn usage(&self) -> &str {
        "trunc PATH SIZE"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let size = parse_u64(args[1])?;
        log::debug!("trunc('{path}', {size})");
        let result = session.storage.truncate(path, size);
        log::debug!("trunc('{path}', {size}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// unlink
// ---------------------------------------------------------------------------

struct UnlinkCmd;
impl Command for UnlinkCmd {
    fn name(&self) -> &str {
        "unlink"
    }
    fn description(&self) -> &str {
        "Remove a file"
    }
    fn usage(&self) -> &str {
        "unlink PATH"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        log::debug!("unlink('{path}')");
        let result = session.storage.unlink(path);
        log::debug!("unlink('{path}') rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// rename
// ---------------------------------------------------------------------------

struct RenameCmd;
impl Command for RenameCmd {
    fn name(&self) -> &str {
        "rename"
    }
    fn description(&self) -> &str {
        "Rename a file or directory"
    }
    fn usage(&self) -> &str {
        "rename OLD NEW"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let (from, to) = (args[0], args[1]);
        log::debug!("rename('{from}', '{to}')");
        let result = session.storage.rename(from, to);
        log::debug!("rename('{from}', '{to}') rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// utime
// ---------------------------------------------------------------------------

struct UtimeCmd;
impl Command for UtimeCmd {
    fn name(&self) -> &str {
        "utime"
    }
    fn description(&self) -> &str {
        "Set access and modification times (seconds since the epoch)"
    }
    fn usage(&self) -> &str {
        "utime PATH ATIME MTIME"
    }
    fn category(&self) -> &str {
        "metadata"
    }
    fn arity(&self) -> usize {
        3
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        let atime = parse_u64(args[1])?;
        let mtime = parse_u64(args[2])?;
        log::debug!("utime('{path}', {atime}, {mtime})");
        let result = session.storage.utime(
            path,
            Timespec::from_secs(atime),
            Timespec::from_secs(mtime),
        );
        log::debug!("utime('{path}', {atime}, {mtime}) rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

/// Register the path-based metadata commands.
pub fn register_path_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(AccessCmd));
    reg.register(Box::new(ChmodCmd));
    reg.register(Box::new(ChownCmd));
    reg.register(Box::new(StatCmd));
    reg.register(Box::new(TruncCmd));
    reg.register(Box::new(UnlinkCmd));
    reg.register(Box::new(RenameCmd));
    reg.register(Box::new(UtimeCmd));
}

#[cfg(test)]
mod tests {
    use fsrepl_storage::{MemoryStorage, Storage};
    use fsrepl_types::config::ReplConfig;

    use super::*;
    use crate::test_utils::{RecordingStorage, exec};

    fn setup() -> (CommandRegistry, MemoryStorage) {
        let mut reg = CommandRegistry::new();
        register_path_commands(&mut reg);
        let mut st = MemoryStorage::new();
        let mut fh = st.create("/f", 0o644).unwrap();
        st.write(&mut fh, b"foobarbazgoo").unwrap();
        st.close(&mut fh).unwrap();
        (reg, st)
    }

    #[test]
    fn chmod_then_access() {
        let (reg, mut st) = setup();
        let mut session = Session::new(&mut st, &ReplConfig::default());
        exec(&reg, &mut session, "chmod /f 400").unwrap();
        exec(&reg, &mut session, "access /f 4").unwrap();
        exec(&reg, &mut session, "access /f 0").unwrap();
        assert_eq!(exec(&reg, &mut session, "access /f 2").unwrap_err().status(), -13);
        assert_eq!(exec(&reg, &mut session, "access /g 0").unwrap_err().status(), -2);
    }

    #[test]
    fn access_mode_out_of_range() {
        let (reg, mut st) = setup();
        let mut session = Session::new(&mut st, &ReplConfig::default());
        let err = exec(&reg, &mut session, "access /f 10").unwrap_err();
        assert!(matches!(err, ReplError::BadMode(_)));
    }

    #[test]
    fn chown_takes_path_and_owner() {
        let (reg, mut st) = setup();
        {
            let mut session = Session::new(&mut st, &ReplConfig::default());
            exec(&reg, &mut session, "chown /f 1000").unwrap();
            let err = exec(&reg, &mut session, "chown /f 1000 1000").unwrap_err();
            assert!(matches!(err, ReplError::Arity { .. }));
        }
        assert_eq!(st.stat("/f").unwrap().uid, 1000);
    }

    #[test]
    fn stat_prints_one_line() {
        let (reg, mut st) = setup();
        let ino = st.stat("/f").unwrap().ino;
        let mut session = Session::new(&mut st, &ReplConfig::default());
        let CommandOutput::Text(line) = exec(&reg, &mut session, "stat /f").unwrap() else {
            panic!("stat should print text");
        };
        assert!(line.starts_with(&format!("st_dev=0, st_ino={ino:X}, st_mode=100644, st_nlink=1")));
        assert!(line.contains("st_size=12, st_blksize=4096, st_blocks=1"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn stat_rejects_extra_arguments() {
        let (reg, _) = setup();
        let mut st = RecordingStorage::new();
        {
            let mut session = Session::new(&mut st, &ReplConfig::default());
            assert!(exec(&reg, &mut session, "stat /f /g").is_err());
        }
        assert_eq!(st.calls(), 0);
    }

    #[test]
    fn trunc_by_path() {
        let (reg, mut st) = setup();
        {
            let mut session = Session::new(&mut st, &ReplConfig::default());
            exec(&reg, &mut session, "trunc /f 0").unwrap();
        }
        assert_eq!(st.stat("/f").unwrap().size, 0);
    }

    #[test]
    fn rename_and_unlink() {
        let (reg, mut st) = setup();
        {
            let mut session = Session::new(&mut st, &ReplConfig::default());
            exec(&reg, &mut session, "rename /f /g").unwrap();
            assert_eq!(exec(&reg, &mut session, "unlink /f").unwrap_err().status(), -2);
            exec(&reg, &mut session, "unlink /g").unwrap();
        }
        assert!(st.stat("/g").is_err());
    }

    #[test]
    fn utime_sets_whole_seconds() {
        let (reg, mut st) = setup();
        {
            let mut session = Session::new(&mut st, &ReplConfig::default());
            exec(&reg, &mut session, "utime /f 0 1700000000").unwrap();
        }
        let attrs = st.stat("/f").unwrap();
        assert_eq!(attrs.atime, Timespec::from_secs(0));
        assert_eq!(attrs.mtime, Timespec::from_secs(1_700_000_000));
    }

    #[test]
    fn bad_numbers() {
        let (reg, mut st) = setup();
        let mut session = Session::new(&mut st, &ReplConfig::default());
        for line in ["chown /f -1", "trunc /f 1k", "utime /f x 0"] {
            let err = exec(&reg, &mut session, line).unwrap_err();
            assert!(matches!(err, ReplError::BadNumber(_)), "{line}");
        }
    }
}

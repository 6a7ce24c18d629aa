//! Extended attribute commands: getxattr, setxattr, removexattr, listxattr.
//!
//! Reads follow the two-phase convention of the storage interface: ask for
//! the size with an empty buffer, then fetch into a buffer of that size.

use fsrepl_storage::XattrFlags;
use fsrepl_types::error::Result;

use crate::interpreter::{Command, CommandOutput, CommandRegistry, parse_u64, preview, rc};
use crate::session::Session;

// ---------------------------------------------------------------------------
// getxattr
// ---------------------------------------------------------------------------

struct GetxattrCmd;
impl Command for GetxattrCmd {
    fn name(&self) -> &str {
        "getxattr"
    }
    fn description(&self) -> &str {
        "Print the length and value of an attribute"
    }
    fn usage(&self) -> &str {
        "getxattr PATH NAME"
    }
    fn category(&self) -> &str {
        "xattr"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let (path, name) = (args[0], args[1]);
        log::debug!("getxattr('{path}', '{name}')");
        let result = session.storage.getxattr(path, name, &mut []);
        log::debug!("getxattr('{path}', '{name}') size rc = {}", rc(&result));
        let mut value = vec![0u8; result?];
        if !value.is_empty() {
            let result = session.storage.getxattr(path, name, &mut value);
            log::debug!("getxattr('{path}', '{name}') rc = {}", rc(&result));
            value.truncate(result?);
        }
        Ok(CommandOutput::Value(value))
    }
}

// ---------------------------------------------------------------------------
// setxattr
// ---------------------------------------------------------------------------

struct SetxattrCmd;
impl Command for SetxattrCmd {
    fn name(&self) -> &str {
        "setxattr"
    }
    fn description(&self) -> &str {
        "Set an attribute to the rest of the line (flags: 1 create, 2 replace)"
    }
    fn usage(&self) -> &str {
        "setxattr PATH NAME FLAGS VALUE..."
    }
    fn category(&self) -> &str {
        "xattr"
    }
    fn arity(&self) -> usize {
        4
    }
    fn literal_tail(&self) -> bool {
        true
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let (path, name) = (args[0], args[1]);
        let flags = parse_u64(args[2])?;
        let value = args[3];
        let shown = preview(value);
        log::debug!("setxattr('{path}', '{name}', '{shown}', {flags:x})");
        let result = session.storage.setxattr(
            path,
            name,
            value.as_bytes(),
            XattrFlags::from_bits_retain(flags),
        );
        log::debug!(
            "setxattr('{path}', '{name}', '{shown}', {flags:x}) rc = {}",
            rc(&result)
        );
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// removexattr
// ---------------------------------------------------------------------------

struct RemovexattrCmd;
impl Command for RemovexattrCmd {
    fn name(&self) -> &str {
        "removexattr"
    }
    fn description(&self) -> &str {
        "Remove an attribute"
    }
    fn usage(&self) -> &str {
        "removexattr PATH NAME"
    }
    fn category(&self) -> &str {
        "xattr"
    }
    fn arity(&self) -> usize {
        2
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let (path, name) = (args[0], args[1]);
        log::debug!("removexattr('{path}', '{name}')");
        let result = session.storage.removexattr(path, name);
        log::debug!("removexattr('{path}', '{name}') rc = {}", rc(&result));
        result?;
        Ok(CommandOutput::None)
    }
}

// ---------------------------------------------------------------------------
// listxattr
// ---------------------------------------------------------------------------

struct ListxattrCmd;
impl Command for ListxattrCmd {
    fn name(&self) -> &str {
        "listxattr"
    }
    fn description(&self) -> &str {
        "Print the byte length of the name list, then one name per line"
    }
    fn usage(&self) -> &str {
        "listxattr PATH"
    }
    fn category(&self) -> &str {
        "xattr"
    }
    fn arity(&self) -> usize {
        1
    }
    fn execute(&self, args: &[&str], session: &mut Session<'_>) -> Result<CommandOutput> {
        let path = args[0];
        log::debug!("listxattr('{path}')");
        let result = session.storage.listxattr(path, &mut []);
        log::debug!("listxattr('{path}') size rc = {}", rc(&result));
        let mut names = vec![0u8; result?];
        if !names.is_empty() {
            let result = session.storage.listxattr(path, &mut names);
            log::debug!("listxattr('{path}') rc = {}", rc(&result));
            names.truncate(result?);
        }
        let lines = names
            .split(|&b| b == 0)
            .filter(|name| !name.is_empty())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect();
        Ok(CommandOutput::Listing {
            count: names.len(),
            lines,
        })
    }
}

/// Register the extended attribute commands.
pub fn register_xattr_commands(reg: &mut CommandRegistry) {
    reg.register(Box::new(GetxattrCmd));
    reg.register(Box::new(SetxattrCmd));
    reg.register(Box::new(RemovexattrCmd));
    reg.register(Box::new(ListxattrCmd));
}

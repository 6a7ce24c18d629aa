//! Built-in command set.

use crate::interpreter::CommandRegistry;

/// Register every built-in command into a registry.
pub fn register_builtins(reg: &mut CommandRegistry) {
    crate::file_commands::register_file_commands(reg);
    crate::dir_commands::register_dir_commands(reg);
    crate::path_commands::register_path_commands(reg);
    crate::xattr_commands::register_xattr_commands(reg);
    crate::shell_commands::register_shell_commands(reg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Grammar;

    #[test]
    fn all_builtins_registered() {
        let mut reg = CommandRegistry::new();
        register_builtins(&mut reg);
        let names: Vec<&str> = reg.list_commands().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            [
                "access", "chmod", "chown", "close", "closedir", "create", "ftrunc", "getxattr",
                "listxattr", "mkdir", "open", "opendir", "read", "readdir", "removexattr",
                "rename", "rmdir", "setxattr", "shell", "stat", "sync", "trunc", "unlink",
                "utime", "write",
            ]
        );
    }

    #[test]
    fn only_write_setxattr_shell_take_a_tail() {
        let mut reg = CommandRegistry::new();
        register_builtins(&mut reg);
        let tails: Vec<(&str, usize)> = reg
            .list_commands()
            .into_iter()
            .filter_map(|(n, _)| reg.tail_position(n).map(|p| (n, p)))
            .collect();
        assert_eq!(tails, [("setxattr", 3), ("shell", 0), ("write", 3)]);
    }
}

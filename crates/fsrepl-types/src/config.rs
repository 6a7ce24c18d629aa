//! Session configuration loaded from TOML.
//!
//! ```toml
//! # Upper bound on whitespace-separated arguments per statement.
//! max_args = 10
//! # Descriptor table limits.
//! file_capacity = 1024
//! dir_capacity = 1024
//! # Allow the `shell` escape hatch.
//! allow_shell = false
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{ReplError, Result};

/// Environment variable naming a config file when `--config` is absent.
pub const CONFIG_ENV: &str = "FSREPL_CONFIG";

/// Interpreter session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplConfig {
    /// Maximum number of fixed arguments a statement may carry.
    #[serde(default = "default_max_args")]
    pub max_args: usize,
    /// Capacity of the open-file descriptor table.
    #[serde(default = "default_capacity")]
    pub file_capacity: usize,
    /// Capacity of the open-directory descriptor table.
    #[serde(default = "default_capacity")]
    pub dir_capacity: usize,
    /// Whether `shell` statements may spawn processes.
    #[serde(default)]
    pub allow_shell: bool,
}

fn default_max_args() -> usize {
    10
}
fn default_capacity() -> usize {
    1024
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            max_args: default_max_args(),
            file_capacity: default_capacity(),
            dir_capacity: default_capacity(),
            allow_shell: false,
        }
    }
}

impl ReplConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("loaded config from {}: {config:?}", path.display());
        Ok(config)
    }

    /// Reject settings the interpreter cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_args == 0 {
            return Err(ReplError::Config("max_args must be at least 1".into()));
        }
        if self.file_capacity == 0 || self.dir_capacity == 0 {
            return Err(ReplError::Config(
                "descriptor table capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let c = ReplConfig::default();
        assert_eq!(c.max_args, 10);
        assert_eq!(c.file_capacity, 1024);
        assert_eq!(c.dir_capacity, 1024);
        assert!(!c.allow_shell);
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(ReplConfig::from_toml_str("").unwrap(), ReplConfig::default());
    }

    #[test]
    fn partial_override() {
        let c = ReplConfig::from_toml_str("file_capacity = 4\nallow_shell = true\n").unwrap();
        assert_eq!(c.file_capacity, 4);
        assert_eq!(c.dir_capacity, 1024);
        assert!(c.allow_shell);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = ReplConfig::from_toml_str("dir_capacity = 0").unwrap_err();
        assert!(matches!(err, ReplError::Config(_)));
    }

    #[test]
    fn zero_max_args_rejected() {
        assert!(ReplConfig::from_toml_str("max_args = 0").is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let err = ReplConfig::from_toml_str("volume = \"v1\"").unwrap_err();
        assert!(matches!(err, ReplError::TomlParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "max_args = 12").unwrap();
        let c = ReplConfig::load(f.path()).unwrap();
        assert_eq!(c.max_args, 12);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReplConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ReplError::Io(_)));
    }
}

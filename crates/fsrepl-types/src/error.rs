//! Error types for fsrepl.
//!
//! Two layers exist. [`Errno`] is the closed set of failure kinds a storage
//! backend may report; it is propagated through the interpreter untouched.
//! [`ReplError`] covers everything the interpreter itself can reject (bad
//! lines, bad arguments, exhausted descriptor tables) and wraps `Errno`.
//! Every error maps onto a negative POSIX-style status via
//! [`ReplError::status`].

use std::io;

/// Failure kinds reported by a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Errno {
    #[error("operation not permitted")]
    NotPermitted,

    #[error("no such file or directory")]
    NotFound,

    #[error("input/output error")]
    Io,

    #[error("bad file descriptor")]
    BadDescriptor,

    #[error("out of memory")]
    OutOfMemory,

    #[error("permission denied")]
    PermissionDenied,

    #[error("device or resource busy")]
    Busy,

    #[error("file exists")]
    Exists,

    #[error("not a directory")]
    NotADirectory,

    #[error("is a directory")]
    IsADirectory,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("too many open files")]
    TooManyOpenFiles,

    #[error("file too large")]
    FileTooLarge,

    #[error("no space left on device")]
    NoSpace,

    #[error("result out of range")]
    Range,

    #[error("file name too long")]
    NameTooLong,

    #[error("directory not empty")]
    NotEmpty,

    #[error("no data available")]
    NoData,
}

impl Errno {
    /// The Linux errno number for this kind.
    pub fn errno(self) -> i32 {
        match self {
            Self::NotPermitted => 1,
            Self::NotFound => 2,
            Self::Io => 5,
            Self::BadDescriptor => 9,
            Self::OutOfMemory => 12,
            Self::PermissionDenied => 13,
            Self::Busy => 16,
            Self::Exists => 17,
            Self::NotADirectory => 20,
            Self::IsADirectory => 21,
            Self::InvalidArgument => 22,
            Self::TooManyOpenFiles => 23,
            Self::FileTooLarge => 27,
            Self::NoSpace => 28,
            Self::Range => 34,
            Self::NameTooLong => 36,
            Self::NotEmpty => 39,
            Self::NoData => 61,
        }
    }

    /// Negative status as reported by a failed statement.
    pub fn status(self) -> i32 {
        -self.errno()
    }
}

/// Convenience alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, Errno>;

/// Errors produced while parsing, validating, or dispatching a statement.
#[derive(Debug, thiserror::Error)]
pub enum ReplError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command}: expected {expected} argument(s), got {got}")]
    Arity {
        command: String,
        expected: usize,
        got: usize,
    },

    #[error("not an unsigned integer: '{0}'")]
    BadNumber(String),

    #[error("not an octal mode: '{0}'")]
    BadMode(String),

    #[error("descriptor table full ({capacity} slots)")]
    TableFull { capacity: usize },

    #[error("bad descriptor: {0}")]
    BadDescriptor(u64),

    #[error("shell commands are disabled")]
    ShellDisabled,

    #[error("config error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("{0}")]
    Storage(#[from] Errno),
}

impl ReplError {
    /// Map the error onto the negative status a statement reports.
    pub fn status(&self) -> i32 {
        let errno = match self {
            Self::Io(_) => Errno::Io,
            Self::InvalidStatement(_)
            | Self::UnknownCommand(_)
            | Self::Arity { .. }
            | Self::BadNumber(_)
            | Self::BadMode(_)
            | Self::Config(_)
            | Self::TomlParse(_) => Errno::InvalidArgument,
            Self::TableFull { .. } => Errno::TooManyOpenFiles,
            Self::BadDescriptor(_) => Errno::BadDescriptor,
            Self::ShellDisabled => Errno::NotPermitted,
            Self::Storage(e) => *e,
        };
        errno.status()
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ReplError>;

//! Storage interface driven by the fsrepl interpreter.
//!
//! [`Storage`] is the capability set a replay script exercises: handle-based
//! file and directory access plus path-based metadata and xattr operations.
//! Every call is synchronous and reports failures as an [`Errno`].
//! [`MemoryStorage`] is a complete in-memory implementation used by the
//! binary and by tests.

use std::fmt;

use bitflags::bitflags;
use fsrepl_types::error::StorageResult;

pub use fsrepl_types::error::Errno;

pub mod memory;

pub use memory::MemoryStorage;

/// File type bits of `Attributes::mode`.
pub const S_IFMT: u32 = 0o170_000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100_000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040_000;

bitflags! {
    /// Flags accepted by [`Storage::open`], numbered as on Linux.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u64 {
        const WRONLY = 0o1;
        const RDWR = 0o2;
        const CREAT = 0o100;
        const EXCL = 0o200;
        const TRUNC = 0o1000;
        const APPEND = 0o2000;
    }
}

impl OpenFlags {
    /// Read-only access (no access-mode bits set).
    pub const RDONLY: Self = Self::empty();

    /// Whether the access mode allows reading.
    pub fn readable(self) -> bool {
        !self.contains(Self::WRONLY)
    }

    /// Whether the access mode allows writing.
    pub fn writable(self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }

    /// `WRONLY | RDWR` together is not a valid access mode.
    pub fn valid_access_mode(self) -> bool {
        !self.contains(Self::WRONLY | Self::RDWR)
    }
}

bitflags! {
    /// Permission bits checked by [`Storage::access`]. Empty means "exists".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMode: u32 {
        const EXEC = 0o1;
        const WRITE = 0o2;
        const READ = 0o4;
    }
}

bitflags! {
    /// Flags accepted by [`Storage::setxattr`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct XattrFlags: u64 {
        /// Fail with `Exists` if the attribute is already set.
        const CREATE = 0x1;
        /// Fail with `NoData` if the attribute is not set.
        const REPLACE = 0x2;
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    /// Numeric type code printed by `readdir`.
    pub fn code(self) -> u8 {
        match self {
            Self::File => 1,
            Self::Directory => 2,
        }
    }
}

/// Seconds + nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    pub sec: u64,
    pub nsec: u32,
}

impl Timespec {
    /// Whole seconds, zero nanoseconds.
    pub fn from_secs(sec: u64) -> Self {
        Self { sec, nsec: 0 }
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        let d = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: d.as_secs(),
            nsec: d.subsec_nanos(),
        }
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.sec, self.nsec)
    }
}

/// Result of [`Storage::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attributes {
    pub dev: u64,
    pub ino: u64,
    /// Type bits plus permission bits.
    pub mode: u32,
    pub nlink: u64,
    pub uid: u64,
    pub gid: u64,
    pub rdev: u64,
    pub size: u64,
    pub blksize: u64,
    pub blocks: u64,
    pub atime: Timespec,
    pub mtime: Timespec,
    pub ctime: Timespec,
}

impl Attributes {
    pub fn kind(&self) -> EntryKind {
        if self.mode & S_IFMT == S_IFDIR {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }

    /// Permission bits only.
    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// One-line `key=value` rendering printed by the `stat` command.
impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "st_dev={}, st_ino={:X}, st_mode={:o}, st_nlink={}, st_uid={}, st_gid={}, \
             st_rdev={}, st_size={}, st_blksize={}, st_blocks={}, st_atime={}, \
             st_mtime={}, st_ctime={}",
            self.dev,
            self.ino,
            self.mode,
            self.nlink,
            self.uid,
            self.gid,
            self.rdev,
            self.size,
            self.blksize,
            self.blocks,
            self.atime,
            self.mtime,
            self.ctime,
        )
    }
}

/// A single entry returned by [`Storage::readdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub kind: EntryKind,
    pub file_id: u64,
    pub name: String,
}

impl fmt::Display for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:X} '{}'", self.kind.code(), self.file_id, self.name)
    }
}

/// An open file. Carries the current offset; not `Clone`, so a handle has
/// exactly one owner.
#[derive(Debug, PartialEq, Eq)]
pub struct FileHandle {
    id: u64,
    flags: OpenFlags,
    offset: u64,
}

impl FileHandle {
    /// Build a handle for a backend-assigned id.
    pub fn new(id: u64, flags: OpenFlags) -> Self {
        Self {
            id,
            flags,
            offset: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }
}

/// An open directory with its listing cursor.
#[derive(Debug, PartialEq, Eq)]
pub struct DirHandle {
    id: u64,
    cursor: usize,
}

impl DirHandle {
    pub fn new(id: u64) -> Self {
        Self { id, cursor: 0 }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of entries already returned.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn advance(&mut self, n: usize) {
        self.cursor += n;
    }
}

/// Capability set consumed by the interpreter.
///
/// Handles are created by `open`/`create`/`opendir` and stay valid until a
/// successful `close`/`closedir`. A failed close leaves the handle open.
pub trait Storage {
    fn open(&mut self, path: &str, flags: OpenFlags) -> StorageResult<FileHandle>;

    /// Create a new file and open it for reading and writing.
    fn create(&mut self, path: &str, mode: u32) -> StorageResult<FileHandle>;

    fn close(&mut self, handle: &mut FileHandle) -> StorageResult<()>;

    fn opendir(&mut self, path: &str) -> StorageResult<DirHandle>;

    fn closedir(&mut self, handle: &mut DirHandle) -> StorageResult<()>;

    /// Reposition the handle's offset; returns the new offset.
    fn seek(&mut self, handle: &mut FileHandle, offset: u64) -> StorageResult<u64>;

    /// Read up to `len` bytes at the handle's offset, advancing it.
    fn read(&mut self, handle: &mut FileHandle, len: u64) -> StorageResult<Vec<u8>>;

    /// Write at the handle's offset, advancing it. Returns bytes written.
    fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> StorageResult<usize>;

    /// Next batch of at most `max` entries. An empty batch means the listing
    /// is exhausted.
    fn readdir(&mut self, handle: &mut DirHandle, max: usize) -> StorageResult<Vec<DirEntry>>;

    fn stat(&self, path: &str) -> StorageResult<Attributes>;

    fn access(&self, path: &str, mode: AccessMode) -> StorageResult<()>;

    fn chmod(&mut self, path: &str, mode: u32) -> StorageResult<()>;

    fn chown(&mut self, path: &str, owner: u64) -> StorageResult<()>;

    fn utime(&mut self, path: &str, atime: Timespec, mtime: Timespec) -> StorageResult<()>;

    fn mkdir(&mut self, path: &str, mode: u32) -> StorageResult<()>;

    fn rmdir(&mut self, path: &str) -> StorageResult<()>;

    fn unlink(&mut self, path: &str) -> StorageResult<()>;

    fn rename(&mut self, from: &str, to: &str) -> StorageResult<()>;

    /// Copy the attribute value into `buf`. An empty `buf` only reports the
    /// value's size; a non-empty one that is too small fails with `Range`.
    fn getxattr(&self, path: &str, name: &str, buf: &mut [u8]) -> StorageResult<usize>;

    fn setxattr(
        &mut self,
        path: &str,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> StorageResult<()>;

    fn removexattr(&mut self, path: &str, name: &str) -> StorageResult<()>;

    /// NUL-terminated attribute names, with the same sizing convention as
    /// [`Storage::getxattr`].
    fn listxattr(&self, path: &str, buf: &mut [u8]) -> StorageResult<usize>;

    fn truncate(&mut self, path: &str, size: u64) -> StorageResult<()>;

    fn ftruncate(&mut self, handle: &mut FileHandle, size: u64) -> StorageResult<()>;

    fn fsync(&mut self, handle: &mut FileHandle) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_flags_access_mode() {
        assert!(OpenFlags::RDONLY.readable());
        assert!(!OpenFlags::RDONLY.writable());
        assert!(!OpenFlags::WRONLY.readable());
        assert!(OpenFlags::WRONLY.writable());
        assert!(OpenFlags::RDWR.readable() && OpenFlags::RDWR.writable());
        assert!(!(OpenFlags::WRONLY | OpenFlags::RDWR).valid_access_mode());
    }

    #[test]
    fn open_flags_from_numeric() {
        let f = OpenFlags::from_bits_retain(0o1102);
        assert!(f.contains(OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::TRUNC));
    }

    #[test]
    fn stat_line_format() {
        let attrs = Attributes {
            dev: 0,
            ino: 0x1a,
            mode: S_IFREG | 0o644,
            nlink: 1,
            uid: 1000,
            gid: 1000,
            rdev: 0,
            size: 12,
            blksize: 4096,
            blocks: 1,
            atime: Timespec { sec: 5, nsec: 7 },
            mtime: Timespec::from_secs(6),
            ctime: Timespec::from_secs(6),
        };
        assert_eq!(
            attrs.to_string(),
            "st_dev=0, st_ino=1A, st_mode=100644, st_nlink=1, st_uid=1000, st_gid=1000, \
             st_rdev=0, st_size=12, st_blksize=4096, st_blocks=1, st_atime=5.7, \
             st_mtime=6.0, st_ctime=6.0"
        );
        assert_eq!(attrs.kind(), EntryKind::File);
        assert_eq!(attrs.permissions(), 0o644);
    }

    #[test]
    fn dir_entry_line_format() {
        let e = DirEntry {
            kind: EntryKind::Directory,
            file_id: 255,
            name: "sub".into(),
        };
        assert_eq!(e.to_string(), "2 FF 'sub'");
    }

    #[test]
    fn handle_offset_tracking() {
        let mut fh = FileHandle::new(3, OpenFlags::RDWR);
        assert_eq!(fh.offset(), 0);
        fh.set_offset(42);
        assert_eq!(fh.offset(), 42);
        let mut dh = DirHandle::new(4);
        dh.advance(2);
        assert_eq!(dh.cursor(), 2);
    }
}

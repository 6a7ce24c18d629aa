//! Storage wrapper for tests: counts calls and can be told to fail closes.

use std::cell::Cell;

use fsrepl_storage::{
    AccessMode, Attributes, DirEntry, DirHandle, FileHandle, MemoryStorage, OpenFlags, Storage,
    Timespec, XattrFlags,
};
use fsrepl_types::error::{Errno, StorageResult};

/// A [`MemoryStorage`] that records how many storage calls it has served.
pub struct RecordingStorage {
    pub inner: MemoryStorage,
    calls: Cell<usize>,
    /// Make `close` and `closedir` fail with `Io` and leave the handle open.
    pub fail_close: bool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self {
            inner: MemoryStorage::new(),
            calls: Cell::new(0),
            fail_close: false,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn hit(&self) {
        self.calls.set(self.calls.get() + 1);
    }
}

impl Storage for RecordingStorage {
    fn open(&mut self, path: &str, flags: OpenFlags) -> StorageResult<FileHandle> {
        self.hit();
        self.inner.open(path, flags)
    }

    fn create(&mut self, path: &str, mode: u32) -> StorageResult<FileHandle> {
        self.hit();
        self.inner.create(path, mode)
    }

    fn close(&mut self, handle: &mut FileHandle) -> StorageResult<()> {
        self.hit();
        if self.fail_close {
            return Err(Errno::Io);
        }
        self.inner.close(handle)
    }

    fn opendir(&mut self, path: &str) -> StorageResult<DirHandle> {
        self.hit();
        self.inner.opendir(path)
    }

    fn closedir(&mut self, handle: &mut DirHandle) -> StorageResult<()> {
        self.hit();
        if self.fail_close {
            return Err(Errno::Io);
        }
        self.inner.closedir(handle)
    }

    fn seek(&mut self, handle: &mut FileHandle, offset: u64) -> StorageResult<u64> {
        self.hit();
        self.inner.seek(handle, offset)
    }

    fn read(&mut self, handle: &mut FileHandle, len: u64) -> StorageResult<Vec<u8>> {
        self.hit();
        self.inner.read(handle, len)
    }

    fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> StorageResult<usize> {
        self.hit();
        self.inner.write(handle, data)
    }

    fn readdir(&mut self, handle: &mut DirHandle, max: usize) -> StorageResult<Vec<DirEntry>> {
        self.hit();
        self.inner.readdir(handle, max)
    }

    fn stat(&self, path: &str) -> StorageResult<Attributes> {
        self.hit();
        self.inner.stat(path)
    }

    fn access(&self, path: &str, mode: AccessMode) -> StorageResult<()> {
        self.hit();
        self.inner.access(path, mode)
    }

    fn chmod(&mut self, path: &str, mode: u32) -> StorageResult<()> {
        self.hit();
        self.inner.chmod(path, mode)
    }

    fn chown(&mut self, path: &str, owner: u64) -> StorageResult<()> {
        self.hit();
        self.inner.chown(path, owner)
    }

    fn utime(&mut self, path: &str, atime: Timespec, mtime: Timespec) -> StorageResult<()> {
        self.hit();
        self.inner.utime(path, atime, mtime)
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> StorageResult<()> {
        self.hit();
        self.inner.mkdir(path, mode)
    }

    fn rmdir(&mut self, path: &str) -> StorageResult<()> {
        self.hit();
        self.inner.rmdir(path)
    }

    fn unlink(&mut self, path: &str) -> StorageResult<()> {
        self.hit();
        self.inner.unlink(path)
    }

    fn rename(&mut self, from: &str, to: &str) -> StorageResult<()> {
        self.hit();
        self.inner.rename(from, to)
    }

    fn getxattr(&self, path: &str, name: &str, buf: &mut [u8]) -> StorageResult<usize> {
        self.hit();
        self.inner.getxattr(path, name, buf)
    }

    fn setxattr(
        &mut self,
        path: &str,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> StorageResult<()> {
        self.hit();
        self.inner.setxattr(path, name, value, flags)
    }

    fn removexattr(&mut self, path: &str, name: &str) -> StorageResult<()> {
        self.hit();
        self.inner.removexattr(path, name)
    }

    fn listxattr(&self, path: &str, buf: &mut [u8]) -> StorageResult<usize> {
        self.hit();
        self.inner.listxattr(path, buf)
    }

    fn truncate(&mut self, path: &str, size: u64) -> StorageResult<()> {
        self.hit();
        self.inner.truncate(path, size)
    }

    fn ftruncate(&mut self, handle: &mut FileHandle, size: u64) -> StorageResult<()> {
        self.hit();
        self.inner.ftruncate(handle, size)
    }

    fn fsync(&mut self, handle: &mut FileHandle) -> StorageResult<()> {
        self.hit();
        self.inner.fsync(handle)
    }
}

/// Parse `line` with the registry's grammar and run it.
pub fn exec(
    reg: &crate::CommandRegistry,
    session: &mut crate::Session<'_>,
    line: &str,
) -> fsrepl_types::error::Result<crate::CommandOutput> {
    let stmt = crate::parser::parse_line(line.to_string(), reg, session.max_args)?
        .expect("test line is blank");
    reg.execute(&stmt, session)
}

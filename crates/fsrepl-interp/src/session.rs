//! Interpreter session state.

use fsrepl_storage::{DirHandle, FileHandle, Storage};
use fsrepl_types::config::ReplConfig;
use fsrepl_types::error::{ReplError, Result};

use crate::table::DescriptorTable;

/// Everything a statement may touch: the storage and the descriptor tables
/// of handles opened through it.
///
/// Dropping a session closes whatever is still open.
pub struct Session<'a> {
    pub storage: &'a mut dyn Storage,
    pub files: DescriptorTable<FileHandle>,
    pub dirs: DescriptorTable<DirHandle>,
    /// Whether `shell` statements may spawn processes.
    pub allow_shell: bool,
    /// Upper bound on plain arguments per statement.
    pub max_args: usize,
}

impl<'a> Session<'a> {
    pub fn new(storage: &'a mut dyn Storage, config: &ReplConfig) -> Self {
        Self {
            storage,
            files: DescriptorTable::new(config.file_capacity),
            dirs: DescriptorTable::new(config.dir_capacity),
            allow_shell: config.allow_shell,
            max_args: config.max_args,
        }
    }

    /// Place a freshly opened file in the table, closing it again if the
    /// table has no room.
    pub fn insert_file(&mut self, handle: FileHandle) -> Result<usize> {
        match self.files.insert(handle) {
            Ok(index) => Ok(index),
            Err(mut handle) => {
                if let Err(e) = self.storage.close(&mut handle) {
                    log::warn!("close of rejected file handle failed: {e}");
                }
                Err(ReplError::TableFull {
                    capacity: self.files.capacity(),
                })
            },
        }
    }

    /// Directory counterpart of [`Session::insert_file`].
    pub fn insert_dir(&mut self, handle: DirHandle) -> Result<usize> {
        match self.dirs.insert(handle) {
            Ok(index) => Ok(index),
            Err(mut handle) => {
                if let Err(e) = self.storage.closedir(&mut handle) {
                    log::warn!("closedir of rejected directory handle failed: {e}");
                }
                Err(ReplError::TableFull {
                    capacity: self.dirs.capacity(),
                })
            },
        }
    }

    pub fn close_file(&mut self, fd: u64) -> Result<()> {
        let storage = &mut *self.storage;
        self.files.release(fd, |h| storage.close(h))
    }

    pub fn close_dir(&mut self, fd: u64) -> Result<()> {
        let storage = &mut *self.storage;
        self.dirs.release(fd, |h| storage.closedir(h))
    }

    /// Best-effort close of every open descriptor. Returns the number of
    /// closes that failed; their slots are cleared regardless.
    pub fn teardown(&mut self) -> usize {
        let storage = &mut *self.storage;
        let failures =
            self.files.drain(|h| storage.close(h)) + self.dirs.drain(|h| storage.closedir(h));
        if failures > 0 {
            log::warn!("{failures} handle(s) failed to close during teardown");
        }
        failures
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.teardown();
    }
}

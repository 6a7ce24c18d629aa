//! In-memory storage backend.
//!
//! Names live in a `BTreeMap<String, u64>` keyed by normalized absolute path
//! and point into an inode table. Open handles reference inodes rather than
//! names, so a file unlinked while open stays readable through its handle
//! until the last handle closes.
//!
//! Permission checks use the owner, group, or other bits depending on how the
//! inode's owner compares with the storage's own uid/gid. There is no
//! superuser bypass.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use fsrepl_types::error::{Errno, StorageResult};

use crate::{
    AccessMode, Attributes, DirEntry, DirHandle, EntryKind, FileHandle, OpenFlags, S_IFDIR,
    S_IFREG, Storage, Timespec, XattrFlags,
};

const ROOT_INO: u64 = 1;
const BLOCK_SIZE: u64 = 4096;
const NAME_MAX: usize = 255;
/// Largest file the backend will grow to.
pub const MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug)]
enum Data {
    File(Vec<u8>),
    Dir,
}

#[derive(Debug)]
struct Inode {
    data: Data,
    /// Permission bits only; type bits are derived from `data`.
    mode: u32,
    uid: u64,
    gid: u64,
    atime: Timespec,
    mtime: Timespec,
    ctime: Timespec,
    xattrs: BTreeMap<String, Vec<u8>>,
    /// Still reachable through a name.
    linked: bool,
}

impl Inode {
    fn new(data: Data, mode: u32, uid: u64, gid: u64) -> Self {
        let now = Timespec::now();
        Self {
            data,
            mode: mode & 0o7777,
            uid,
            gid,
            atime: now,
            mtime: now,
            ctime: now,
            xattrs: BTreeMap::new(),
            linked: true,
        }
    }

    fn kind(&self) -> EntryKind {
        match self.data {
            Data::File(_) => EntryKind::File,
            Data::Dir => EntryKind::Directory,
        }
    }

    fn touch(&mut self) {
        let now = Timespec::now();
        self.mtime = now;
        self.ctime = now;
    }

    fn resize(&mut self, size: u64) -> StorageResult<()> {
        if size > MAX_FILE_SIZE {
            return Err(Errno::FileTooLarge);
        }
        match &mut self.data {
            Data::File(buf) => buf.resize(size as usize, 0),
            Data::Dir => return Err(Errno::IsADirectory),
        }
        self.touch();
        Ok(())
    }
}

/// An open directory stream: the inode and the path it was listed under.
#[derive(Debug)]
struct OpenDir {
    ino: u64,
    path: String,
}

/// A fully in-memory storage backend.
#[derive(Debug)]
pub struct MemoryStorage {
    names: BTreeMap<String, u64>,
    inodes: HashMap<u64, Inode>,
    /// Open file handle id -> inode.
    open_files: HashMap<u64, u64>,
    open_dirs: HashMap<u64, OpenDir>,
    next_ino: u64,
    next_handle: u64,
    uid: u64,
    gid: u64,
}

impl MemoryStorage {
    /// Create a storage with only the root directory, owned by uid/gid 0.
    pub fn new() -> Self {
        Self::with_owner(0, 0)
    }

    /// Create a storage whose new objects belong to `uid`/`gid`.
    pub fn with_owner(uid: u64, gid: u64) -> Self {
        let mut names = BTreeMap::new();
        names.insert("/".to_string(), ROOT_INO);
        let mut inodes = HashMap::new();
        inodes.insert(ROOT_INO, Inode::new(Data::Dir, 0o755, uid, gid));
        Self {
            names,
            inodes,
            open_files: HashMap::new(),
            open_dirs: HashMap::new(),
            next_ino: ROOT_INO + 1,
            next_handle: 1,
            uid,
            gid,
        }
    }

    /// Number of currently open file and directory handles.
    pub fn open_handle_count(&self) -> usize {
        self.open_files.len() + self.open_dirs.len()
    }

    fn inode(&self, ino: u64) -> StorageResult<&Inode> {
        self.inodes.get(&ino).ok_or(Errno::Io)
    }

    fn inode_mut(&mut self, ino: u64) -> StorageResult<&mut Inode> {
        self.inodes.get_mut(&ino).ok_or(Errno::Io)
    }

    /// Resolve a path to its normalized key and inode.
    fn lookup<'p>(&self, path: &'p str) -> StorageResult<(Cow<'p, str>, u64)> {
        let key = normalize(path);
        match self.names.get(&*key) {
            Some(&ino) => Ok((key, ino)),
            None => Err(self.missing(&key)),
        }
    }

    /// Error for a path that does not resolve: `NotADirectory` when a file
    /// sits where an ancestor directory should be, `NotFound` otherwise.
    fn missing(&self, key: &str) -> Errno {
        let mut cur = parent(key);
        loop {
            if let Some(ino) = self.names.get(cur) {
                return match self.inodes.get(ino).map(Inode::kind) {
                    Some(EntryKind::File) => Errno::NotADirectory,
                    _ => Errno::NotFound,
                };
            }
            if cur == "/" {
                return Errno::NotFound;
            }
            cur = parent(cur);
        }
    }

    /// Check that a new entry named `key` could be linked into its parent.
    fn check_parent(&self, key: &str) -> StorageResult<()> {
        if base_name(key).len() > NAME_MAX {
            return Err(Errno::NameTooLong);
        }
        match self.names.get(parent(key)).and_then(|ino| self.inodes.get(ino)) {
            Some(node) if node.kind() == EntryKind::Directory => Ok(()),
            Some(_) => Err(Errno::NotADirectory),
            None => Err(self.missing(key)),
        }
    }

    fn insert_node(&mut self, key: &str, data: Data, mode: u32) -> StorageResult<u64> {
        if self.names.contains_key(key) {
            return Err(Errno::Exists);
        }
        self.check_parent(key)?;
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes
            .insert(ino, Inode::new(data, mode, self.uid, self.gid));
        self.names.insert(key.to_string(), ino);
        self.touch_parent(key);
        Ok(ino)
    }

    fn touch_parent(&mut self, key: &str) {
        if let Some(&pino) = self.names.get(parent(key)) {
            if let Some(node) = self.inodes.get_mut(&pino) {
                node.touch();
            }
        }
    }

    /// Drop the name `key` and free its inode if nothing else holds it.
    fn unlink_name(&mut self, key: &str) -> StorageResult<()> {
        let ino = self.names.remove(key).ok_or(Errno::NotFound)?;
        self.inode_mut(ino)?.linked = false;
        self.touch_parent(key);
        self.release_if_orphaned(ino);
        Ok(())
    }

    fn release_if_orphaned(&mut self, ino: u64) {
        let linked = self.inodes.get(&ino).is_some_and(|n| n.linked);
        let open = self.open_files.values().any(|&i| i == ino)
            || self.open_dirs.values().any(|d| d.ino == ino);
        if !linked && !open && self.inodes.remove(&ino).is_some() {
            log::trace!("released inode {ino}");
        }
    }

    /// Direct children of a normalized directory path, sorted by name.
    fn children(&self, dir: &str) -> Vec<(String, u64)> {
        let prefix = if dir == "/" {
            "/".to_string()
        } else {
            format!("{dir}/")
        };
        let mut out = Vec::new();
        for (key, &ino) in self.names.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            let rest = &key[prefix.len()..];
            if !rest.is_empty() && !rest.contains('/') {
                out.push((rest.to_string(), ino));
            }
        }
        out
    }

    /// Whether the caller holds all of the `want` rwx bits on `node`.
    fn permits(&self, node: &Inode, want: u32) -> bool {
        let shift = if node.uid == self.uid {
            6
        } else if node.gid == self.gid {
            3
        } else {
            0
        };
        (node.mode >> shift) & want == want
    }

    fn file_ino(&self, handle: &FileHandle) -> StorageResult<u64> {
        self.open_files
            .get(&handle.id())
            .copied()
            .ok_or(Errno::BadDescriptor)
    }

    fn register_file(&mut self, ino: u64, flags: OpenFlags) -> FileHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        self.open_files.insert(id, ino);
        FileHandle::new(id, flags)
    }

    fn attributes(&self, key: &str, ino: u64) -> StorageResult<Attributes> {
        let node = self.inode(ino)?;
        let (type_bits, size, nlink) = match &node.data {
            Data::File(buf) => (S_IFREG, buf.len() as u64, u64::from(node.linked)),
            Data::Dir => {
                let subdirs = self
                    .children(key)
                    .iter()
                    .filter(|(_, i)| {
                        self.inodes
                            .get(i)
                            .is_some_and(|n| n.kind() == EntryKind::Directory)
                    })
                    .count() as u64;
                (S_IFDIR, BLOCK_SIZE, 2 + subdirs)
            },
        };
        Ok(Attributes {
            dev: 0,
            ino,
            mode: type_bits | node.mode,
            nlink,
            uid: node.uid,
            gid: node.gid,
            rdev: 0,
            size,
            blksize: BLOCK_SIZE,
            blocks: size.div_ceil(512),
            atime: node.atime,
            mtime: node.mtime,
            ctime: node.ctime,
        })
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Check whether a path is already in normal form (starts with `/`, no `//`,
/// no trailing `/` unless root).
fn is_normalized(path: &str) -> bool {
    if !path.starts_with('/') {
        return false;
    }
    if path.len() > 1 && path.ends_with('/') {
        return false;
    }
    !path.contains("//")
}

/// Normalize a path: ensure leading `/`, collapse `//`, strip trailing `/`
/// (except for root). Returns the input unchanged when already normal.
fn normalize(path: &str) -> Cow<'_, str> {
    if is_normalized(path) {
        return Cow::Borrowed(path);
    }
    let mut result = String::with_capacity(path.len() + 1);
    let mut prev_slash = false;
    for ch in std::iter::once('/').chain(path.chars()) {
        if ch == '/' {
            if !prev_slash {
                result.push(ch);
            }
            prev_slash = true;
        } else {
            result.push(ch);
            prev_slash = false;
        }
    }
    if result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    Cow::Owned(result)
}

/// Parent of a normalized path.
fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Two-phase copy-out: an empty `buf` asks for the size.
fn copy_out(src: &[u8], buf: &mut [u8]) -> StorageResult<usize> {
    if buf.is_empty() {
        return Ok(src.len());
    }
    if buf.len() < src.len() {
        return Err(Errno::Range);
    }
    buf[..src.len()].copy_from_slice(src);
    Ok(src.len())
}

impl Storage for MemoryStorage {
    fn open(&mut self, path: &str, flags: OpenFlags) -> StorageResult<FileHandle> {
        if !flags.valid_access_mode() {
            return Err(Errno::InvalidArgument);
        }
        let key = normalize(path);
        let ino = match self.names.get(&*key).copied() {
            Some(_) if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) => {
                return Err(Errno::Exists);
            },
            Some(ino) => ino,
            None if flags.contains(OpenFlags::CREAT) => {
                self.insert_node(&key, Data::File(Vec::new()), 0o644)?
            },
            None => return Err(self.missing(&key)),
        };

        let node = self.inode(ino)?;
        if node.kind() == EntryKind::Directory {
            return Err(Errno::IsADirectory);
        }
        let mut want = 0;
        if flags.readable() {
            want |= 0o4;
        }
        if flags.writable() {
            want |= 0o2;
        }
        if !self.permits(node, want) {
            return Err(Errno::PermissionDenied);
        }
        if flags.contains(OpenFlags::TRUNC) && flags.writable() {
            self.inode_mut(ino)?.resize(0)?;
        }
        Ok(self.register_file(ino, flags))
    }

    fn create(&mut self, path: &str, mode: u32) -> StorageResult<FileHandle> {
        let key = normalize(path);
        let ino = self.insert_node(&key, Data::File(Vec::new()), mode)?;
        Ok(self.register_file(ino, OpenFlags::RDWR))
    }

    fn close(&mut self, handle: &mut FileHandle) -> StorageResult<()> {
        let ino = self
            .open_files
            .remove(&handle.id())
            .ok_or(Errno::BadDescriptor)?;
        self.release_if_orphaned(ino);
        Ok(())
    }

    fn opendir(&mut self, path: &str) -> StorageResult<DirHandle> {
        let (key, ino) = self.lookup(path)?;
        let node = self.inode(ino)?;
        if node.kind() != EntryKind::Directory {
            return Err(Errno::NotADirectory);
        }
        if !self.permits(node, 0o4) {
            return Err(Errno::PermissionDenied);
        }
        let id = self.next_handle;
        self.next_handle += 1;
        let path = key.into_owned();
        self.open_dirs.insert(id, OpenDir { ino, path });
        Ok(DirHandle::new(id))
    }

    fn closedir(&mut self, handle: &mut DirHandle) -> StorageResult<()> {
        let ino = self
            .open_dirs
            .remove(&handle.id())
            .map(|d| d.ino)
            .ok_or(Errno::BadDescriptor)?;
        self.release_if_orphaned(ino);
        Ok(())
    }

    fn seek(&mut self, handle: &mut FileHandle, offset: u64) -> StorageResult<u64> {
        self.file_ino(handle)?;
        handle.set_offset(offset);
        Ok(offset)
    }

    fn read(&mut self, handle: &mut FileHandle, len: u64) -> StorageResult<Vec<u8>> {
        let ino = self.file_ino(handle)?;
        if !handle.flags().readable() {
            return Err(Errno::BadDescriptor);
        }
        let Data::File(buf) = &self.inode(ino)?.data else {
            return Err(Errno::IsADirectory);
        };
        let size = buf.len() as u64;
        let start = handle.offset().min(size);
        let end = start.saturating_add(len).min(size);
        let out = buf[start as usize..end as usize].to_vec();
        handle.set_offset(handle.offset() + (end - start));
        Ok(out)
    }

    fn write(&mut self, handle: &mut FileHandle, data: &[u8]) -> StorageResult<usize> {
        let ino = self.file_ino(handle)?;
        let flags = handle.flags();
        if !flags.writable() {
            return Err(Errno::BadDescriptor);
        }
        let node = self.inode_mut(ino)?;
        let Data::File(buf) = &mut node.data else {
            return Err(Errno::IsADirectory);
        };
        if data.is_empty() {
            return Ok(0);
        }
        let start = if flags.contains(OpenFlags::APPEND) {
            buf.len() as u64
        } else {
            handle.offset()
        };
        let end = start
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAX_FILE_SIZE)
            .ok_or(Errno::FileTooLarge)?;
        let (start, end) = (start as usize, end as usize);
        if buf.len() < end {
            buf.resize(end, 0);
        }
        buf[start..end].copy_from_slice(data);
        node.touch();
        handle.set_offset(end as u64);
        Ok(data.len())
    }

    fn readdir(&mut self, handle: &mut DirHandle, max: usize) -> StorageResult<Vec<DirEntry>> {
        let dir = self
            .open_dirs
            .get(&handle.id())
            .ok_or(Errno::BadDescriptor)?;
        // A directory removed or replaced while open lists as empty.
        if self.names.get(&dir.path) != Some(&dir.ino) {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for (name, child) in self.children(&dir.path).into_iter().skip(handle.cursor()).take(max) {
            entries.push(DirEntry {
                kind: self.inode(child)?.kind(),
                file_id: child,
                name,
            });
        }
        handle.advance(entries.len());
        Ok(entries)
    }

    fn stat(&self, path: &str) -> StorageResult<Attributes> {
        let (key, ino) = self.lookup(path)?;
        self.attributes(&key, ino)
    }

    fn access(&self, path: &str, mode: AccessMode) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        if self.permits(self.inode(ino)?, mode.bits()) {
            Ok(())
        } else {
            Err(Errno::PermissionDenied)
        }
    }

    fn chmod(&mut self, path: &str, mode: u32) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        let node = self.inode_mut(ino)?;
        node.mode = mode & 0o7777;
        node.ctime = Timespec::now();
        Ok(())
    }

    fn chown(&mut self, path: &str, owner: u64) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        let node = self.inode_mut(ino)?;
        node.uid = owner;
        node.ctime = Timespec::now();
        Ok(())
    }

    fn utime(&mut self, path: &str, atime: Timespec, mtime: Timespec) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        let node = self.inode_mut(ino)?;
        node.atime = atime;
        node.mtime = mtime;
        node.ctime = Timespec::now();
        Ok(())
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> StorageResult<()> {
        let key = normalize(path);
        self.insert_node(&key, Data::Dir, mode)?;
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> StorageResult<()> {
        let (key, ino) = self.lookup(path)?;
        if key == "/" {
            return Err(Errno::Busy);
        }
        if self.inode(ino)?.kind() != EntryKind::Directory {
            return Err(Errno::NotADirectory);
        }
        if !self.children(&key).is_empty() {
            return Err(Errno::NotEmpty);
        }
        self.unlink_name(&key)
    }

    fn unlink(&mut self, path: &str) -> StorageResult<()> {
        let (key, ino) = self.lookup(path)?;
        if self.inode(ino)?.kind() == EntryKind::Directory {
            return Err(Errno::IsADirectory);
        }
        self.unlink_name(&key)
    }

    fn rename(&mut self, from: &str, to: &str) -> StorageResult<()> {
        let (from, src) = self.lookup(from)?;
        let from = from.into_owned();
        let to = normalize(to).into_owned();
        if from == "/" || to == "/" {
            return Err(Errno::Busy);
        }
        if from == to {
            return Ok(());
        }
        let prefix = format!("{from}/");
        if to.starts_with(&prefix) {
            return Err(Errno::InvalidArgument);
        }
        self.check_parent(&to)?;

        if let Some(&dst) = self.names.get(&to) {
            let src_kind = self.inode(src)?.kind();
            let dst_kind = self.inode(dst)?.kind();
            match (src_kind, dst_kind) {
                (EntryKind::Directory, EntryKind::File) => return Err(Errno::NotADirectory),
                (EntryKind::File, EntryKind::Directory) => return Err(Errno::IsADirectory),
                (EntryKind::Directory, EntryKind::Directory) if !self.children(&to).is_empty() => {
                    return Err(Errno::NotEmpty);
                },
                _ => {},
            }
            self.unlink_name(&to)?;
        }

        // Move the entry and, for directories, everything below it.
        let mut moved = vec![(from.clone(), src)];
        moved.extend(
            self.names
                .range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, &i)| (k.clone(), i)),
        );
        for (key, ino) in moved {
            self.names.remove(&key);
            self.names.insert(format!("{to}{}", &key[from.len()..]), ino);
        }
        for dir in self.open_dirs.values_mut() {
            if dir.path == from || dir.path.starts_with(&prefix) {
                dir.path = format!("{to}{}", &dir.path[from.len()..]);
            }
        }
        self.touch_parent(&from);
        self.touch_parent(&to);
        self.inode_mut(src)?.ctime = Timespec::now();
        Ok(())
    }

    fn getxattr(&self, path: &str, name: &str, buf: &mut [u8]) -> StorageResult<usize> {
        let (_, ino) = self.lookup(path)?;
        let value = self.inode(ino)?.xattrs.get(name).ok_or(Errno::NoData)?;
        copy_out(value, buf)
    }

    fn setxattr(
        &mut self,
        path: &str,
        name: &str,
        value: &[u8],
        flags: XattrFlags,
    ) -> StorageResult<()> {
        if name.is_empty() {
            return Err(Errno::InvalidArgument);
        }
        if name.len() > NAME_MAX {
            return Err(Errno::Range);
        }
        if flags.bits() & !XattrFlags::all().bits() != 0 || flags.is_all() {
            return Err(Errno::InvalidArgument);
        }
        let (_, ino) = self.lookup(path)?;
        let node = self.inode_mut(ino)?;
        let present = node.xattrs.contains_key(name);
        if flags.contains(XattrFlags::CREATE) && present {
            return Err(Errno::Exists);
        }
        if flags.contains(XattrFlags::REPLACE) && !present {
            return Err(Errno::NoData);
        }
        node.xattrs.insert(name.to_string(), value.to_vec());
        node.ctime = Timespec::now();
        Ok(())
    }

    fn removexattr(&mut self, path: &str, name: &str) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        let node = self.inode_mut(ino)?;
        node.xattrs.remove(name).ok_or(Errno::NoData)?;
        node.ctime = Timespec::now();
        Ok(())
    }

    fn listxattr(&self, path: &str, buf: &mut [u8]) -> StorageResult<usize> {
        let (_, ino) = self.lookup(path)?;
        let mut names = Vec::new();
        for name in self.inode(ino)?.xattrs.keys() {
            names.extend_from_slice(name.as_bytes());
            names.push(0);
        }
        copy_out(&names, buf)
    }

    fn truncate(&mut self, path: &str, size: u64) -> StorageResult<()> {
        let (_, ino) = self.lookup(path)?;
        let node = self.inode(ino)?;
        if node.kind() == EntryKind::Directory {
            return Err(Errno::IsADirectory);
        }
        if !self.permits(node, 0o2) {
            return Err(Errno::PermissionDenied);
        }
        self.inode_mut(ino)?.resize(size)
    }

    fn ftruncate(&mut self, handle: &mut FileHandle, size: u64) -> StorageResult<()> {
        let ino = self.file_ino(handle)?;
        if !handle.flags().writable() {
            return Err(Errno::InvalidArgument);
        }
        self.inode_mut(ino)?.resize(size)
    }

    fn fsync(&mut self, handle: &mut FileHandle) -> StorageResult<()> {
        self.file_ino(handle).map(|_| ())
    }
}

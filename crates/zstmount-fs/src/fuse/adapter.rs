//! FUSE adapter implementation.
//!
//! This module implements the `fuser::Filesystem` trait for `ZstFuseFS`,
//! translating inode-based callbacks onto the [`Node`] model of the view.

use super::pool::ReadPool;
use crate::error::FsError;
use crate::vfs::{Node, NodeAttr, NodeKind, ZstView};
use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::{EINVAL, ENOENT};
use log::{debug, error, trace, warn};
use std::ffi::OsStr;
use std::io;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Time-to-live for cached attributes.
const TTL: Duration = Duration::from_secs(1);

/// Block size for filesystem statistics.
const BLOCK_SIZE: u32 = 512;

/// FUSE filesystem exposing one uncompressed file.
pub struct ZstFuseFS {
    /// Shared with the read worker threads.
    view: Arc<ZstView>,
    /// Workers serving `read` requests.
    pool: ReadPool,
    /// User ID for file ownership (defaults to current user).
    uid: u32,
    /// Group ID for file ownership (defaults to current group).
    gid: u32,
    /// Creation time of the filesystem.
    mount_time: SystemTime,
}

impl ZstFuseFS {
    /// Wrap a view and start its read workers.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker threads cannot be spawned.
    pub fn new(view: ZstView) -> io::Result<Self> {
        let pool = ReadPool::new(view.config().read_workers)?;

        // Get current user/group IDs
        let uid = unsafe { libc::getuid() };
        let gid = unsafe { libc::getgid() };

        Ok(Self {
            view: Arc::new(view),
            pool,
            uid,
            gid,
            mount_time: SystemTime::now(),
        })
    }

    pub fn view(&self) -> &ZstView {
        &self.view
    }

    fn file_attr(&self, attr: NodeAttr) -> FileAttr {
        FileAttr {
            ino: attr.node.inode(),
            size: attr.size,
            blocks: attr.size.div_ceil(BLOCK_SIZE as u64),
            atime: self.mount_time,
            mtime: self.mount_time,
            ctime: self.mount_time,
            crtime: self.mount_time,
            kind: file_type(attr.kind),
            perm: attr.perm,
            nlink: attr.nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: BLOCK_SIZE,
            flags: 0,
        }
    }

    fn node(&self, ino: u64, operation: &str) -> Option<Node> {
        let node = Node::from_inode(ino);
        if node.is_none() {
            warn!("{}: inode {} not found", operation, ino);
        }
        node
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::RegularFile => FileType::RegularFile,
    }
}

fn rejected(error: FsError) -> i32 {
    debug!("{}", error);
    error.errno()
}

impl Filesystem for ZstFuseFS {
    /// Look up a directory entry by name.
    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        trace!("lookup(parent={}, name={:?})", parent, name);

        let Some(parent) = self.node(parent, "lookup") else {
            reply.error(ENOENT);
            return;
        };

        match self.view.lookup(parent, name) {
            Ok(node) => reply.entry(&TTL, &self.file_attr(self.view.attr(node)), 0),
            Err(e) => reply.error(rejected(e)),
        }
    }

    /// Get file attributes.
    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        trace!("getattr(ino={})", ino);

        match self.node(ino, "getattr") {
            Some(node) => reply.attr(&TTL, &self.file_attr(self.view.attr(node))),
            None => reply.error(ENOENT),
        }
    }

    /// Read directory entries.
    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        trace!("readdir(ino={}, offset={})", ino, offset);

        let Some(dir) = self.node(ino, "readdir") else {
            reply.error(ENOENT);
            return;
        };

        let entries = match self.view.entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(rejected(e));
                return;
            }
        };

        // Skip to offset and add entries until buffer is full
        for (i, entry) in entries.iter().enumerate().skip(offset.max(0) as usize) {
            // next_offset = i + 1
            let full = reply.add(
                entry.node.inode(),
                (i + 1) as i64,
                file_type(entry.kind),
                &entry.name,
            );
            if full {
                break;
            }
        }

        reply.ok();
    }

    /// Open the file; any write access is refused.
    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        trace!("open(ino={}, flags={:#o})", ino, flags);

        let Some(node) = self.node(ino, "open") else {
            reply.error(ENOENT);
            return;
        };

        let write = flags & libc::O_ACCMODE != libc::O_RDONLY;
        match self.view.open(node, write) {
            // Reads are stateless, so the handle is a dummy.
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(rejected(e)),
        }
    }

    /// Read file data.
    ///
    /// Decoding can take a while for large offsets, so requests are served by
    /// the worker pool and overlapping reads do not queue behind each other.
    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        trace!("read(ino={}, offset={}, size={})", ino, offset, size);

        let Some(node) = self.node(ino, "read") else {
            reply.error(ENOENT);
            return;
        };
        if offset < 0 {
            reply.error(EINVAL);
            return;
        }

        let view = Arc::clone(&self.view);
        let queued = self.pool.execute(move || match view.read(node, offset as u64, size) {
            Ok(data) => {
                trace!("read: {} bytes at offset {}", data.len(), offset);
                reply.data(&data);
            }
            Err(e) => {
                error!("read: offset {} size {} failed: {}", offset, size, e);
                reply.error(e.errno());
            }
        });

        // An unsent reply answers EIO when dropped.
        if !queued {
            error!("read: worker pool is gone");
        }
    }

    /// Get filesystem statistics.
    fn statfs(&mut self, _req: &Request, _ino: u64, reply: ReplyStatfs) {
        trace!("statfs");

        let blocks = self.view.size().div_ceil(BLOCK_SIZE as u64);

        reply.statfs(
            blocks,     // total blocks
            0,          // free blocks
            0,          // available blocks
            2,          // total inodes
            0,          // free inodes
            BLOCK_SIZE, // block size
            255,        // max name length
            BLOCK_SIZE, // fragment size
        );
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        trace!("setattr(ino={})", ino);
        reply.error(rejected(self.view.reject_mutation("setattr")));
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        trace!("write(ino={}, offset={}, size={})", ino, offset, data.len());
        reply.error(rejected(self.view.reject_mutation("write")));
    }

    fn mknod(
        &mut self,
        _req: &Request,
        _parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        trace!("mknod(name={:?})", name);
        reply.error(rejected(self.view.reject_mutation("mknod")));
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        _parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        trace!("mkdir(name={:?})", name);
        reply.error(rejected(self.view.reject_mutation("mkdir")));
    }

    fn create(
        &mut self,
        _req: &Request,
        _parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        trace!("create(name={:?})", name);
        reply.error(rejected(self.view.reject_mutation("create")));
    }

    fn unlink(&mut self, _req: &Request, _parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!("unlink(name={:?})", name);
        reply.error(rejected(self.view.reject_mutation("unlink")));
    }

    fn rmdir(&mut self, _req: &Request, _parent: u64, name: &OsStr, reply: ReplyEmpty) {
        trace!("rmdir(name={:?})", name);
        reply.error(rejected(self.view.reject_mutation("rmdir")));
    }

    fn rename(
        &mut self,
        _req: &Request,
        _parent: u64,
        name: &OsStr,
        _newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        trace!("rename(name={:?}, newname={:?})", name, newname);
        reply.error(rejected(self.view.reject_mutation("rename")));
    }

    fn symlink(
        &mut self,
        _req: &Request,
        _parent: u64,
        link_name: &OsStr,
        _target: &std::path::Path,
        reply: ReplyEntry,
    ) {
        trace!("symlink(link_name={:?})", link_name);
        reply.error(rejected(self.view.reject_unsupported("symlink")));
    }

    fn link(
        &mut self,
        _req: &Request,
        _ino: u64,
        _newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        trace!("link(newname={:?})", newname);
        reply.error(rejected(self.view.reject_unsupported("link")));
    }
}

fn mount_options(view: &ZstView) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::RO,
        MountOption::FSName("zstdmount".to_string()),
        MountOption::Subtype("zstd".to_string()),
        MountOption::DefaultPermissions,
    ];
    if view.config().allow_other {
        options.push(MountOption::AllowOther);
    }
    options
}

/// Mount the view at its configured mount point.
///
/// This function blocks until the filesystem is unmounted.
///
/// # Errors
///
/// Returns an error if the mount point is invalid or FUSE mounting fails.
pub fn mount(view: ZstView) -> io::Result<()> {
    let options = mount_options(&view);
    let mount_point = view.config().mount_point.clone();

    debug!(
        "Mounting {} at {} as {:?} ({} bytes)",
        view.config().source.display(),
        mount_point.display(),
        view.file_name(),
        view.size()
    );

    let fs = ZstFuseFS::new(view)?;
    fuser::mount2(fs, &mount_point, &options)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("FUSE mount failed: {}", e)))
}

/// Mount the view in the background and return a session handle.
///
/// The filesystem will remain mounted until the returned `BackgroundSession`
/// is dropped or `join()` is called on it.
pub fn mount_background(view: ZstView) -> io::Result<fuser::BackgroundSession> {
    let options = mount_options(&view);
    let mount_point = view.config().mount_point.clone();

    debug!(
        "Mounting {} at {} (background)",
        view.config().source.display(),
        mount_point.display()
    );

    let fs = ZstFuseFS::new(view)?;
    fuser::spawn_mount2(fs, &mount_point, &options)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("FUSE mount failed: {}", e)))
}

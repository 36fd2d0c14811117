use crate::error::{FsError, Result};
use log::{debug, info};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use zstmount_decode::{default_block_size, probe_uncompressed_size, BlockCache, RangeReader};

/// Inode of the mount root.
pub const ROOT_INODE: u64 = 1;

/// Inode of the uncompressed file.
pub const FILE_INODE: u64 = 2;

/// Configuration for mounting a compressed file.
#[derive(Debug, Clone)]
pub struct MountConfig {
    /// Path to the zstd-compressed source.
    pub source: PathBuf,
    /// Directory the view is mounted on.
    pub mount_point: PathBuf,
    /// Name of the uncompressed file inside the mount.
    pub file_name: String,
    /// Decoder block size in bytes.
    pub block_size: usize,
    /// Decoded blocks kept in memory between reads (0 disables caching).
    pub cache_blocks: usize,
    /// Let users other than the mounting user access the mount.
    pub allow_other: bool,
    /// Threads serving reads; bounds how many decodes run at once.
    pub read_workers: usize,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            mount_point: PathBuf::new(),
            file_name: "zst".to_string(),
            block_size: default_block_size(),
            cache_blocks: 0,
            allow_other: false,
            read_workers: 4,
        }
    }
}

impl MountConfig {
    /// Check the settings that cannot be fixed up later.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(FsError::InvalidConfig("block size must be at least 1".into()));
        }
        if self.read_workers == 0 {
            return Err(FsError::InvalidConfig("read workers must be at least 1".into()));
        }
        let name = self.file_name.as_str();
        let reserved = name.is_empty() || name == "." || name == "..";
        if reserved || name.contains('/') || name.contains('\0') {
            return Err(FsError::InvalidConfig(format!("invalid file name {:?}", name)));
        }
        Ok(())
    }
}

/// The two entries of the mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Root,
    File,
}

impl Node {
    pub fn inode(self) -> u64 {
        match self {
            Node::Root => ROOT_INODE,
            Node::File => FILE_INODE,
        }
    }

    pub fn from_inode(inode: u64) -> Option<Self> {
        match inode {
            ROOT_INODE => Some(Node::Root),
            FILE_INODE => Some(Node::File),
            _ => None,
        }
    }

    pub fn kind(self) -> NodeKind {
        match self {
            Node::Root => NodeKind::Directory,
            Node::File => NodeKind::RegularFile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    RegularFile,
}

/// Attributes reported for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeAttr {
    pub node: Node,
    pub kind: NodeKind,
    pub size: u64,
    pub perm: u16,
    pub nlink: u32,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub node: Node,
    pub kind: NodeKind,
    pub name: String,
}

/// A read-only directory holding one file: the uncompressed content of the
/// source.
///
/// The uncompressed size is measured once at construction and never changes
/// afterwards; reads go through a [`RangeReader`] that keeps no per-call state,
/// so a view can be shared between threads behind an `Arc`.
#[derive(Debug)]
pub struct ZstView {
    config: MountConfig,
    size: u64,
    reader: RangeReader,
}

impl ZstView {
    /// Probe the source and build the view.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the source cannot
    /// be opened or fully decoded.
    pub fn new(config: MountConfig) -> Result<Self> {
        config.validate()?;
        info!("Probing uncompressed size of {}", config.source.display());
        let size = probe_uncompressed_size(&config.source)?;
        Self::with_size(config, size)
    }

    /// Build the view over an already known uncompressed size.
    pub fn with_size(config: MountConfig, size: u64) -> Result<Self> {
        config.validate()?;
        let mut reader = RangeReader::new(config.source.clone(), config.block_size)?;
        if config.cache_blocks > 0 {
            debug!("Caching up to {} decoded blocks", config.cache_blocks);
            reader = reader.with_cache(Arc::new(BlockCache::new(config.cache_blocks)));
        }
        Ok(Self {
            config,
            size,
            reader,
        })
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    /// Uncompressed size of the exposed file.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn file_name(&self) -> &str {
        &self.config.file_name
    }

    pub fn reader(&self) -> &RangeReader {
        &self.reader
    }

    /// Resolve `name` inside `parent`.
    pub fn lookup(&self, parent: Node, name: &OsStr) -> Result<Node> {
        match parent {
            Node::File => Err(FsError::NotDirectory),
            Node::Root if name == OsStr::new(&self.config.file_name) => Ok(Node::File),
            Node::Root => Err(FsError::NotFound(name.to_string_lossy().into_owned())),
        }
    }

    pub fn attr(&self, node: Node) -> NodeAttr {
        match node {
            Node::Root => NodeAttr {
                node,
                kind: NodeKind::Directory,
                size: 0,
                perm: 0o755,
                nlink: 2,
            },
            Node::File => NodeAttr {
                node,
                kind: NodeKind::RegularFile,
                size: self.size,
                perm: 0o444,
                nlink: 1,
            },
        }
    }

    /// List a directory: `.`, `..` and the file.
    pub fn entries(&self, dir: Node) -> Result<Vec<DirEntry>> {
        if dir != Node::Root {
            return Err(FsError::NotDirectory);
        }
        Ok(vec![
            DirEntry {
                node: Node::Root,
                kind: NodeKind::Directory,
                name: ".".to_string(),
            },
            DirEntry {
                node: Node::Root,
                kind: NodeKind::Directory,
                name: "..".to_string(),
            },
            DirEntry {
                node: Node::File,
                kind: NodeKind::RegularFile,
                name: self.config.file_name.clone(),
            },
        ])
    }

    /// Check that `node` may be opened with the requested access.
    pub fn open(&self, node: Node, write: bool) -> Result<()> {
        match node {
            Node::Root => Err(FsError::IsDirectory),
            Node::File if write => Err(FsError::ReadOnly("open for writing")),
            Node::File => Ok(()),
        }
    }

    /// Read up to `size` bytes at `offset`.
    ///
    /// Requests running past the end of the file are clamped; an offset at or
    /// beyond the end yields an empty buffer. Decode failures are returned as
    /// errors, never as a short read.
    pub fn read(&self, node: Node, offset: u64, size: u32) -> Result<Vec<u8>> {
        if node != Node::File {
            return Err(FsError::IsDirectory);
        }
        if offset >= self.size {
            return Ok(Vec::new());
        }
        let length = u64::from(size).min(self.size - offset) as usize;
        Ok(self.reader.read_range(offset, length, self.size)?)
    }

    /// Error for an operation that would modify the mount.
    pub fn reject_mutation(&self, operation: &'static str) -> FsError {
        FsError::ReadOnly(operation)
    }

    /// Error for an operation this filesystem does not implement.
    pub fn reject_unsupported(&self, operation: &'static str) -> FsError {
        FsError::NotSupported(operation)
    }
}

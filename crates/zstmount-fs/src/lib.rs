//! # zstmount-fs
//!
//! Read-only virtual file view over a zstd-compressed file.
//!
//! This crate provides:
//! - Mount configuration ([`MountConfig`])
//! - The two-entry namespace model ([`Node`]) and its operations ([`ZstView`])
//! - errno mapping for failed operations ([`FsError`])
//! - FUSE filesystem support (with `fuse` feature)
//! - The `zstdmount` binary (with `cli` feature)
//!
//! ## Example
//!
//! ```ignore
//! use std::ffi::OsStr;
//! use zstmount_fs::{MountConfig, Node, ZstView};
//!
//! let config = MountConfig {
//!     source: "/data/dump.sql.zst".into(),
//!     ..MountConfig::default()
//! };
//! let view = ZstView::new(config)?;
//! let file = view.lookup(Node::Root, OsStr::new("zst"))?;
//! let head = view.read(file, 0, 4096)?;
//! ```
//!
//! ## FUSE Support
//!
//! Enable the `fuse` feature to mount the view:
//!
//! ```ignore
//! use zstmount_fs::fuse::mount;
//! use zstmount_fs::{MountConfig, ZstView};
//!
//! let config = MountConfig {
//!     source: "/data/dump.sql.zst".into(),
//!     mount_point: "/mnt/zst".into(),
//!     ..MountConfig::default()
//! };
//! mount(ZstView::new(config)?)?;
//! ```

mod error;
mod vfs;

#[cfg(feature = "fuse")]
pub mod fuse;

pub use error::{FsError, Result};
pub use vfs::{
    DirEntry, MountConfig, Node, NodeAttr, NodeKind, ZstView, FILE_INODE, ROOT_INODE,
};

// Re-export decode types for convenience
pub use zstmount_decode::{BlockCache, RangeReader};

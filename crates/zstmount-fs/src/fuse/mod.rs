//! FUSE adapter for the uncompressed view.
//!
//! Mounts a [`crate::ZstView`] as a read-only filesystem holding a single
//! file, so any program can read the decompressed content with ordinary
//! file I/O.
//!
//! # Features
//!
//! - **No Temporary Files**: every read decodes on the fly from the
//!   compressed source
//! - **Concurrent Reads**: reads run on a fixed pool of worker threads, each
//!   with its own decode session
//! - **Strictly Read-Only**: mutating operations fail with `EROFS`
//!
//! # Example
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

mod adapter;
mod pool;

pub use adapter::*;
pub use pool::ReadPool;

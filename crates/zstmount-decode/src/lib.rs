//! # zstmount-decode
//!
//! Random-access reads over a zstd-compressed file without a seek table.
//!
//! This crate provides:
//! - [`DecodeSession`]: one forward-only decode pass producing fixed-size blocks
//! - [`probe_uncompressed_size`]: a full pass that measures the decompressed length
//! - [`RangeReader`]: byte-range extraction by re-decoding from the start
//! - [`BlockCache`]: an optional bounded cache of decoded blocks
//!
//! ## Example
//!
//! ```ignore
//! use zstmount_decode::{default_block_size, probe_uncompressed_size, RangeReader};
//!
//! let size = probe_uncompressed_size("dump.sql.zst")?;
//! let reader = RangeReader::new("dump.sql.zst", default_block_size())?;
//! let head = reader.read_range(0, 512.min(size as usize), size)?;
//! ```

mod cache;
mod error;
mod probe;
mod range;
mod session;

pub use cache::BlockCache;
pub use error::{Error, Result};
pub use probe::{probe_reader, probe_uncompressed_size};
pub use range::{read_range, RangeReader, Window};
pub use session::{default_block_size, default_input_size, DecodeSession};

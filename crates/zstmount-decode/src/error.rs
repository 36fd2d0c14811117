use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding a compressed source.
#[derive(Debug, Error)]
pub enum Error {
    /// The compressed source could not be opened.
    #[error("cannot open compressed source {}: {source}", path.display())]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not a single byte could be read from the source.
    #[error("compressed source is empty")]
    EmptySource,

    /// The codec rejected the stream (malformed, corrupt or truncated).
    #[error("decompression error: {0}")]
    Decompression(String),

    /// The stream ended before the requested bytes were produced.
    #[error("stream ended after {produced} bytes, {needed} bytes required")]
    ShortSource { needed: u64, produced: u64 },

    /// A buffer or decoder context could not be allocated.
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The requested range lies outside the uncompressed stream.
    #[error("range {offset}+{length} exceeds uncompressed size {size}")]
    OutOfRange { offset: u64, length: u64, size: u64 },

    /// Block size must be at least one byte.
    #[error("invalid block size: {0}")]
    InvalidBlockSize(usize),

    /// I/O error while reading the source.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for decode operations.
pub type Result<T> = std::result::Result<T, Error>;

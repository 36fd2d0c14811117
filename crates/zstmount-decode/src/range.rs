//! Byte-range extraction over a forward-only decoder.
//!
//! A read of `(offset, length)` is mapped onto the inclusive span of blocks
//! that cover it. The source is decoded from block 0 on every call (there is
//! no seek table), blocks inside the window are copied out with their actual
//! produced length, and decoding stops once the last block of the window has
//! been produced. The cost of a call is therefore O(offset + length).

use crate::cache::BlockCache;
use crate::error::{Error, Result};
use crate::session::{alloc_buffer, DecodeSession};
use log::{debug, trace};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inclusive span of block indices needed for one read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// First block touched by the request.
    pub first: u64,
    /// Last block touched by the request.
    pub last: u64,
}

impl Window {
    /// Blocks covering `[offset, offset + length)`, or `None` for an empty request.
    pub fn covering(offset: u64, length: u64, block_size: usize) -> Option<Self> {
        if length == 0 || block_size == 0 {
            return None;
        }
        let block_size = block_size as u64;
        let end = offset.checked_add(length)?;
        Some(Self {
            first: offset / block_size,
            last: (end - 1) / block_size,
        })
    }

    /// Number of blocks in the window.
    pub fn block_count(&self) -> u64 {
        self.last - self.first + 1
    }

    pub fn contains(&self, index: u64) -> bool {
        (self.first..=self.last).contains(&index)
    }

    /// Uncompressed offset of the first byte of the window.
    pub fn start_offset(&self, block_size: usize) -> u64 {
        self.first * block_size as u64
    }
}

/// Serves byte ranges of the uncompressed stream behind `source`.
///
/// Holds no per-call state: each read opens its own [`DecodeSession`], so a
/// single reader can be shared between threads.
#[derive(Debug, Clone)]
pub struct RangeReader {
    source: PathBuf,
    block_size: usize,
    cache: Option<Arc<BlockCache>>,
}

impl RangeReader {
    /// Create a reader decoding `source` in blocks of `block_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBlockSize`] if `block_size` is zero.
    pub fn new<P: Into<PathBuf>>(source: P, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidBlockSize(block_size));
        }
        Ok(Self {
            source: source.into(),
            block_size,
            cache: None,
        })
    }

    /// Attach a block cache, possibly shared with other readers of any
    /// block size.
    pub fn with_cache(mut self, cache: Arc<BlockCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn cache(&self) -> Option<&Arc<BlockCache>> {
        self.cache.as_ref()
    }

    /// Return exactly `length` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfRange`] if `offset + length` exceeds `uncompressed_size`
    /// - [`Error::SourceOpen`] / [`Error::Decompression`] from the decode pass
    /// - [`Error::ShortSource`] if the stream ends before the range is produced
    /// - [`Error::Allocation`] if the assembly buffer cannot be allocated
    pub fn read_range(&self, offset: u64, length: usize, uncompressed_size: u64) -> Result<Vec<u8>> {
        let out_of_range = || Error::OutOfRange {
            offset,
            length: length as u64,
            size: uncompressed_size,
        };
        let end = offset
            .checked_add(length as u64)
            .filter(|end| *end <= uncompressed_size)
            .ok_or_else(out_of_range)?;

        let window = match Window::covering(offset, length as u64, self.block_size) {
            Some(window) => window,
            None => return Ok(Vec::new()),
        };
        let relative = (offset - window.start_offset(self.block_size)) as usize;

        if let Some(bytes) = self.read_cached(window, relative, length) {
            trace!("range {}+{} served from cache", offset, length);
            return Ok(bytes);
        }

        debug!(
            "range {}+{} -> blocks {}..={} of {} bytes",
            offset, length, window.first, window.last, self.block_size
        );
        let mut assembled = self.decode_window(window)?;

        if assembled.len() < relative + length {
            return Err(Error::ShortSource {
                needed: end,
                produced: window.start_offset(self.block_size) + assembled.len() as u64,
            });
        }

        assembled.truncate(relative + length);
        assembled.drain(..relative);
        Ok(assembled)
    }

    /// Decode from block 0 through `window.last`, keeping the window's blocks.
    fn decode_window(&self, window: Window) -> Result<Vec<u8>> {
        let capacity = usize::try_from(window.block_count())
            .ok()
            .and_then(|count| count.checked_mul(self.block_size))
            .ok_or_else(|| {
                Error::Allocation(format!("window of {} blocks", window.block_count()))
            })?;
        let mut assembled = Vec::new();
        assembled
            .try_reserve_exact(capacity)
            .map_err(|e| Error::Allocation(format!("{} byte assembly buffer: {}", capacity, e)))?;

        let mut block = alloc_buffer(self.block_size)?;
        let mut session = DecodeSession::open(&self.source)?;

        let mut index = 0u64;
        while index <= window.last {
            let produced = session.fill_block(&mut block)?;
            if produced == 0 {
                break;
            }

            if window.contains(index) {
                let data = &block[..produced];
                assembled.extend_from_slice(data);
                if let Some(cache) = &self.cache {
                    cache.insert(&self.source, self.block_size, index, data);
                }
            }

            // Only the final block of the stream comes back short.
            if produced < self.block_size {
                break;
            }
            index += 1;
        }

        Ok(assembled)
    }

    fn read_cached(&self, window: Window, relative: usize, length: usize) -> Option<Vec<u8>> {
        let cache = self.cache.as_ref()?;
        let mut assembled = Vec::new();
        for index in window.first..=window.last {
            let block = cache.get(&self.source, self.block_size, index)?;
            assembled.extend_from_slice(&block);
        }
        if assembled.len() < relative + length {
            return None;
        }
        assembled.truncate(relative + length);
        assembled.drain(..relative);
        Some(assembled)
    }
}

/// Read `length` bytes at `offset` from the uncompressed view of `source`.
pub fn read_range<P: AsRef<Path>>(
    source: P,
    block_size: usize,
    offset: u64,
    length: usize,
    uncompressed_size: u64,
) -> Result<Vec<u8>> {
    RangeReader::new(source.as_ref(), block_size)?.read_range(offset, length, uncompressed_size)
}

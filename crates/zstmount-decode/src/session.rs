//! Streaming decode session over a zstd-compressed source.
//!
//! A [`DecodeSession`] owns everything one forward decode pass needs: the
//! source handle, the input chunk buffer and the decoder context. It is
//! created per pass and released by `Drop`, so every exit path (including
//! the error branches) tears it down.

use crate::error::{Error, Result};
use log::trace;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zstd::stream::raw::{Decoder, InBuffer, Operation, OutBuffer};
use zstd::zstd_safe::DCtx;

/// Recommended decoder output size, used as the default block size.
pub fn default_block_size() -> usize {
    DCtx::out_size()
}

/// Recommended decoder input chunk size.
pub fn default_input_size() -> usize {
    DCtx::in_size()
}

/// Allocate a zeroed buffer, reporting failure instead of aborting.
pub(crate) fn alloc_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| Error::Allocation(format!("{} byte buffer: {}", len, e)))?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// One forward-only decode pass.
///
/// Output is pulled in blocks with [`DecodeSession::fill_block`]. Every block
/// is filled completely unless the stream ends inside it, which makes block
/// numbering a pure function of the decompressed position.
pub struct DecodeSession<R: Read = File> {
    source: R,
    decoder: Decoder<'static>,
    input: Vec<u8>,
    input_pos: usize,
    input_len: usize,
    bytes_in: u64,
    bytes_out: u64,
    exhausted: bool,
    /// Last value returned by the decoder; `0` once a frame is fully
    /// decoded and flushed.
    hint: usize,
}

impl DecodeSession<File> {
    /// Open `path` and prepare a fresh decoder for it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::SourceOpen {
            path: path.to_path_buf(),
            source,
        })?;
        trace!("opened decode session for {}", path.display());
        Self::from_reader(file)
    }
}

impl<R: Read> DecodeSession<R> {
    /// Build a session over any byte source.
    pub fn from_reader(source: R) -> Result<Self> {
        Self::with_input_size(source, default_input_size())
    }

    /// Build a session reading the source in chunks of `input_size` bytes.
    pub fn with_input_size(source: R, input_size: usize) -> Result<Self> {
        let decoder = Decoder::new()
            .map_err(|e| Error::Allocation(format!("decoder context: {}", e)))?;
        Ok(Self {
            source,
            decoder,
            input: alloc_buffer(input_size.max(1))?,
            input_pos: 0,
            input_len: 0,
            bytes_in: 0,
            bytes_out: 0,
            exhausted: false,
            hint: 1,
        })
    }

    /// Compressed bytes consumed from the source so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Decompressed bytes produced so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.exhausted && self.input_pos == self.input_len && self.hint == 0
    }

    /// Decode the next block into `block`.
    ///
    /// Returns the number of bytes written. Anything short of `block.len()`
    /// means the stream ended inside this block; `0` means it had already
    /// ended.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptySource`] if the source yields no bytes at all
    /// - [`Error::Decompression`] if the stream is corrupt or truncated
    /// - [`Error::IoError`] if reading the source fails
    pub fn fill_block(&mut self, block: &mut [u8]) -> Result<usize> {
        let mut written = 0;

        while written < block.len() {
            if self.input_pos == self.input_len {
                if !self.exhausted {
                    self.refill()?;
                }
                if self.exhausted && self.hint == 0 {
                    break;
                }
            }

            let mut input = InBuffer::around(&self.input[self.input_pos..self.input_len]);
            let mut output = OutBuffer::around(&mut block[written..]);
            self.hint = self
                .decoder
                .run(&mut input, &mut output)
                .map_err(|e| Error::Decompression(e.to_string()))?;

            let consumed = input.pos();
            let produced = output.pos();
            self.input_pos += consumed;
            written += produced;

            if consumed == 0 && produced == 0 {
                if !self.exhausted {
                    return Err(Error::Decompression(format!(
                        "decoder stalled at compressed offset {}",
                        self.bytes_in - (self.input_len - self.input_pos) as u64
                    )));
                }
                if self.hint != 0 {
                    return Err(Error::Decompression(format!(
                        "truncated stream: source ended after {} bytes inside a frame",
                        self.bytes_in
                    )));
                }
                break;
            }
        }

        self.bytes_out += written as u64;
        Ok(written)
    }

    fn refill(&mut self) -> Result<()> {
        let read = loop {
            match self.source.read(&mut self.input) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };

        if read == 0 {
            self.exhausted = true;
            if self.bytes_in == 0 {
                return Err(Error::EmptySource);
            }
        }

        self.input_pos = 0;
        self.input_len = read;
        self.bytes_in += read as u64;
        Ok(())
    }
}

impl<R: Read> Drop for DecodeSession<R> {
    fn drop(&mut self) {
        trace!(
            "closing decode session ({} bytes in, {} bytes out)",
            self.bytes_in,
            self.bytes_out
        );
    }
}

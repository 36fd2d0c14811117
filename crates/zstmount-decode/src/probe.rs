use crate::error::Result;
use crate::session::{alloc_buffer, default_block_size, DecodeSession};
use log::debug;
use std::io::Read;
use std::path::Path;

/// Decode the whole source once and return its uncompressed length.
///
/// A source holding a valid frame with no content yields `Ok(0)`; a source
/// with no bytes at all yields [`crate::Error::EmptySource`].
pub fn probe_uncompressed_size<P: AsRef<Path>>(source: P) -> Result<u64> {
    let source = source.as_ref();
    let mut session = DecodeSession::open(source)?;
    let size = measure(&mut session)?;
    debug!(
        "probed {}: {} compressed bytes -> {} uncompressed bytes",
        source.display(),
        session.bytes_in(),
        size
    );
    Ok(size)
}

/// Like [`probe_uncompressed_size`], over an arbitrary reader.
pub fn probe_reader<R: Read>(reader: R) -> Result<u64> {
    let mut session = DecodeSession::from_reader(reader)?;
    measure(&mut session)
}

fn measure<R: Read>(session: &mut DecodeSession<R>) -> Result<u64> {
    let mut block = alloc_buffer(default_block_size())?;
    while session.fill_block(&mut block)? > 0 {}
    Ok(session.bytes_out())
}

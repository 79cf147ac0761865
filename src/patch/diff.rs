// PuffDiff: produce a puffin patch between two deflate-backed streams.
//
// Both sides are puffed in full, the puff buffers are handed to a
// bsdiff-class engine, and the resulting inner patch is wrapped in the
// envelope together with the extent lists the apply side needs.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use log::debug;

use crate::codec::puffer::Puffer;
use crate::error::{Error, Result};
use crate::extent::BitExtent;
use crate::locate::find_puff_locations;
use crate::patch::header::{PatchHeader, StreamInfo, write_patch};
use crate::stream::{ByteStream, PuffinStream};

/// The external binary differ the pipeline delegates to. Implementations
/// produce an opaque patch from two byte buffers and apply it back.
pub trait DeltaEngine {
    fn diff(&self, src: &[u8], dst: &[u8]) -> Result<Vec<u8>>;
    fn apply(&self, src: &[u8], patch: &[u8], dst: &mut dyn io::Write) -> Result<u64>;
}

/// bsdiff-compatible engine backed by the `qbsdiff` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct BsdiffEngine;

impl DeltaEngine for BsdiffEngine {
    fn diff(&self, src: &[u8], dst: &[u8]) -> Result<Vec<u8>> {
        let mut patch = Vec::new();
        qbsdiff::Bsdiff::new(src, dst)
            .compare(io::Cursor::new(&mut patch))
            .map_err(Error::StreamIo)?;
        Ok(patch)
    }

    fn apply(&self, src: &[u8], patch: &[u8], dst: &mut dyn io::Write) -> Result<u64> {
        qbsdiff::Bspatch::new(patch)
            .map_err(Error::StreamIo)?
            .apply(src, dst)
            .map_err(Error::StreamIo)
    }
}

/// Puff the whole of `stream` into memory, returning the stream description
/// for the patch header alongside the puff bytes.
pub(crate) fn puff_whole_stream<S: ByteStream>(
    mut stream: S,
    deflates: Vec<BitExtent>,
) -> Result<(StreamInfo, Vec<u8>)> {
    let (puffs, puff_length) = find_puff_locations(&mut stream, &deflates)?;
    let puffer = Rc::new(RefCell::new(Puffer::new()));
    let mut reader = PuffinStream::new_for_puff(
        stream,
        puffer,
        puff_length,
        deflates.clone(),
        puffs.clone(),
    )?;
    let mut buffer = vec![0u8; puff_length as usize];
    reader.read(&mut buffer)?;
    Ok((
        StreamInfo {
            deflates,
            puffs,
            puff_length,
        },
        buffer,
    ))
}

/// Produce a puffin patch turning `src` into `dst`, diffing the puff views
/// with the given engine. The deflate extent lists must be sorted.
pub fn puff_diff_with_engine<S1, S2, E>(
    src: S1,
    dst: S2,
    src_deflates: Vec<BitExtent>,
    dst_deflates: Vec<BitExtent>,
    engine: &E,
) -> Result<Vec<u8>>
where
    S1: ByteStream,
    S2: ByteStream,
    E: DeltaEngine + ?Sized,
{
    let (src_info, src_puff) = puff_whole_stream(src, src_deflates)?;
    let (dst_info, dst_puff) = puff_whole_stream(dst, dst_deflates)?;
    debug!(
        "diffing puff buffers: src {} bytes, dst {} bytes",
        src_puff.len(),
        dst_puff.len()
    );

    let inner = engine.diff(&src_puff, &dst_puff)?;
    let header = PatchHeader {
        src: src_info,
        dst: dst_info,
    };
    write_patch(&header, &inner)
}

/// [`puff_diff_with_engine`] with the default bsdiff-class engine.
pub fn puff_diff<S1: ByteStream, S2: ByteStream>(
    src: S1,
    dst: S2,
    src_deflates: Vec<BitExtent>,
    dst_deflates: Vec<BitExtent>,
) -> Result<Vec<u8>> {
    puff_diff_with_engine(src, dst, src_deflates, dst_deflates, &BsdiffEngine)
}

// PuffPatch: apply a puffin patch to a deflate-backed source stream.
//
// The source puff stream is materialized in memory (bounded by the
// configured cache size), the inner patch is applied by the delta engine,
// and its output is pushed through a huff-side PuffinStream which emits the
// destination deflate stream.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use log::debug;

use crate::codec::huffer::Huffer;
use crate::codec::puffer::Puffer;
use crate::error::{Error, Result};
use crate::patch::diff::{BsdiffEngine, DeltaEngine};
use crate::patch::header::parse_patch;
use crate::stream::{ByteStream, PuffinStream};

/// Tunables for patch application.
#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Upper bound on the in-memory copy of the source puff stream.
    pub cache_size: u64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            cache_size: 50 * 1024 * 1024,
        }
    }
}

/// Adapter exposing a huff-side [`PuffinStream`] as an `io::Write` sink for
/// the delta engine.
struct StreamWriter<'a, S: ByteStream> {
    inner: &'a mut PuffinStream<S>,
}

impl<S: ByteStream> io::Write for StreamWriter<'_, S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .write(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Apply `patch` to `src`, writing the reconstructed deflate stream into
/// `dst` with the given engine and configuration.
pub fn puff_patch_with_engine<S1, S2, E>(
    src: S1,
    dst: S2,
    patch: &[u8],
    engine: &E,
    config: &PatchConfig,
) -> Result<()>
where
    S1: ByteStream,
    S2: ByteStream,
    E: DeltaEngine + ?Sized,
{
    let (header, inner) = parse_patch(patch)?;
    if header.src.puff_length > config.cache_size {
        return Err(Error::invalid(format!(
            "source puff stream ({} bytes) exceeds the cache limit ({} bytes)",
            header.src.puff_length, config.cache_size
        )));
    }
    debug!(
        "applying patch: src puff {} bytes, dst puff {} bytes, inner {} bytes",
        header.src.puff_length,
        header.dst.puff_length,
        inner.len()
    );

    // Materialize the source puff view.
    let puffer = Rc::new(RefCell::new(Puffer::new()));
    let mut reader = PuffinStream::new_for_puff(
        src,
        puffer,
        header.src.puff_length,
        header.src.deflates,
        header.src.puffs,
    )?;
    let mut src_puff = vec![0u8; header.src.puff_length as usize];
    reader.read(&mut src_puff)?;

    // Stream the patched puff bytes through the huffer into `dst`.
    let huffer = Rc::new(RefCell::new(Huffer::new()));
    let mut writer = PuffinStream::new_for_huff(
        dst,
        huffer,
        header.dst.puff_length,
        header.dst.deflates,
        header.dst.puffs,
    )?;
    let written = engine.apply(&src_puff, inner, &mut StreamWriter { inner: &mut writer })?;
    if written != header.dst.puff_length || writer.offset()? != header.dst.puff_length {
        return Err(Error::invalid(format!(
            "patched stream size mismatch: got {written}, expected {}",
            header.dst.puff_length
        )));
    }
    writer.close()
}

/// [`puff_patch_with_engine`] with the default engine and configuration.
pub fn puff_patch<S1: ByteStream, S2: ByteStream>(src: S1, dst: S2, patch: &[u8]) -> Result<()> {
    puff_patch_with_engine(src, dst, patch, &BsdiffEngine, &PatchConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::diff::puff_diff;
    use crate::stream::{MemoryStream, shared_buffer};
    use std::rc::Rc;

    #[test]
    fn patch_between_plain_streams() {
        let src_data = b"a stream with no deflate content at all".to_vec();
        let dst_data = b"a stream with no deflate payload at all!".to_vec();

        let patch = puff_diff(
            MemoryStream::for_read(src_data.clone()),
            MemoryStream::for_read(dst_data.clone()),
            vec![],
            vec![],
        )
        .unwrap();

        let out = shared_buffer(Vec::new());
        puff_patch(
            MemoryStream::for_read(src_data),
            MemoryStream::new(Rc::clone(&out), false, true),
            &patch,
        )
        .unwrap();
        assert_eq!(&out.borrow()[..], &dst_data[..]);
    }

    #[test]
    fn cache_limit_is_enforced() {
        let src_data = vec![7u8; 128];
        let dst_data = vec![8u8; 128];
        let patch = puff_diff(
            MemoryStream::for_read(src_data.clone()),
            MemoryStream::for_read(dst_data),
            vec![],
            vec![],
        )
        .unwrap();

        let config = PatchConfig { cache_size: 16 };
        let err = puff_patch_with_engine(
            MemoryStream::for_read(src_data),
            MemoryStream::new(shared_buffer(Vec::new()), false, true),
            &patch,
            &BsdiffEngine,
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn garbage_patch_is_rejected() {
        let err = puff_patch(
            MemoryStream::for_read(vec![0; 4]),
            MemoryStream::new(shared_buffer(Vec::new()), false, true),
            b"not a patch",
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

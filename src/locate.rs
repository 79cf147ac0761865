// Deflate discovery helpers.
//
// These walk a host stream and produce the extent lists the rest of the
// pipeline consumes: per-block deflate bit extents (finer extents give the
// differ more anchors), and the matching puff byte extents with the total
// puff-stream size.

use log::debug;

use crate::codec::bitio::BitReader;
use crate::codec::puffer::Puffer;
use crate::codec::puffio::PuffWriter;
use crate::error::{Error, Result};
use crate::extent::{BitExtent, ByteExtent};
use crate::stream::ByteStream;

/// Split whole deflate streams (byte extents) into one bit extent per
/// deflate block, by decoding them with a sink writer.
pub fn find_deflate_subblocks<S: ByteStream>(
    src: &mut S,
    deflates: &[ByteExtent],
) -> Result<Vec<BitExtent>> {
    let mut puffer = Puffer::new();
    let mut buffer = Vec::new();
    let mut subblocks = Vec::new();
    for deflate in deflates {
        buffer.resize(deflate.length as usize, 0);
        src.seek(deflate.offset)?;
        src.read(&mut buffer)?;

        let mut br = BitReader::new(&buffer);
        let mut pw = PuffWriter::sink();
        let mut blocks = Vec::new();
        puffer.puff_deflate_with_subblocks(&mut br, &mut pw, &mut blocks)?;
        pw.flush()?;
        if br.offset() != buffer.len() {
            return Err(Error::invalid(format!(
                "deflate extent {deflate} not fully consumed"
            )));
        }
        debug!("deflate extent {deflate}: {} sub-blocks", blocks.len());
        subblocks.extend(
            blocks
                .into_iter()
                .map(|b| BitExtent::new(b.offset + deflate.offset * 8, b.length)),
        );
    }
    Ok(subblocks)
}

/// Locate the deflate sub-blocks wrapped inside zlib streams (RFC 1950).
/// `zlibs` gives the byte extents of whole zlib streams, headers and
/// Adler-32 trailers included.
pub fn locate_deflates_in_zlib_blocks<S: ByteStream>(
    src: &mut S,
    zlibs: &[ByteExtent],
) -> Result<Vec<BitExtent>> {
    let mut deflates = Vec::new();
    for zlib in zlibs {
        src.seek(zlib.offset)?;
        let mut header = [0u8; 2];
        src.read(&mut header)?;
        let (cmf, flg) = (header[0], header[1]);

        let cm = cmf & 0x0F;
        if cm != 8 && cm != 15 {
            return Err(Error::invalid(format!("invalid zlib compression method: {cm}")));
        }
        let cinfo = cmf >> 4;
        if cinfo > 7 {
            return Err(Error::invalid(format!("invalid zlib window size: {cinfo}")));
        }
        if (u32::from(cmf) << 8 | u32::from(flg)) % 31 != 0 {
            return Err(Error::invalid(format!(
                "corrupt zlib header at offset {}",
                zlib.offset
            )));
        }

        let fdict = (flg >> 5) & 1;
        let header_len = if fdict == 1 { 6 } else { 2 };
        // Header up front, 4-byte Adler-32 at the back.
        if zlib.length < header_len + 4 {
            return Err(Error::invalid(format!("zlib extent too short: {zlib}")));
        }
        let deflate = ByteExtent::new(zlib.offset + header_len, zlib.length - header_len - 4);
        deflates.extend(find_deflate_subblocks(src, &[deflate])?);
    }
    Ok(deflates)
}

/// Compute where each deflate's puff lands in the imaginary puff stream,
/// and the total puff-stream size. `deflates` must be sorted.
///
/// A deflate that starts mid-byte, bit-contiguous with its predecessor,
/// shares that byte with the predecessor's puff; the byte then has no raw
/// slot of its own (the `gap` term below). Every other partial byte at an
/// extent edge stays in the raw stream verbatim.
pub fn find_puff_locations<S: ByteStream>(
    src: &mut S,
    deflates: &[BitExtent],
) -> Result<(Vec<ByteExtent>, u64)> {
    let mut puffer = Puffer::new();
    let mut buffer = Vec::new();
    let mut puffs = Vec::with_capacity(deflates.len());

    // Running difference between puff and deflate sizes; signed, since a
    // puff can be smaller than its deflate.
    let mut size_diff: i64 = 0;
    for (i, deflate) in deflates.iter().enumerate() {
        let first = deflate.first_byte();
        buffer.resize((deflate.past_last_byte() - first) as usize, 0);
        src.seek(first)?;
        src.read(&mut buffer)?;

        let head_bits = (deflate.offset % 8) as u32;
        let mut br =
            BitReader::with_bit_length(&buffer, u64::from(head_bits) + deflate.length);
        br.cache_bits(head_bits)?;
        br.drop_bits(head_bits);
        let mut pw = PuffWriter::sink();
        puffer.puff_deflate(&mut br, &mut pw)?;
        pw.flush()?;
        if br.bits_remaining() != 0 {
            return Err(Error::invalid(format!(
                "deflate extent {deflate} not fully consumed"
            )));
        }

        let gap = i64::from(
            i > 0 && deflates[i - 1].end() == deflate.offset && deflate.offset % 8 != 0,
        );
        let start_byte = (deflate.offset + 7) / 8;
        let end_byte = deflate.end() / 8;
        let whole_bytes = end_byte as i64 - start_byte as i64;

        let puff_offset = start_byte as i64 - gap + size_diff;
        let puff_size = pw.size() as u64;
        if puff_offset < 0 {
            return Err(Error::invalid("inconsistent deflate extents"));
        }
        puffs.push(ByteExtent::new(puff_offset as u64, puff_size));
        size_diff += puff_size as i64 - whole_bytes - gap;
    }

    let total = src.size()? as i64 + size_diff;
    if total < 0 {
        return Err(Error::invalid("inconsistent deflate extents"));
    }
    Ok((puffs, total as u64))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::MemoryStream;

    #[test]
    fn subblocks_of_a_two_block_stream() {
        // Raw byte, then two fixed blocks sharing a byte, then a raw byte.
        let data = vec![0xAA, 0x02, 0x0C, 0x00, 0xBB];
        let mut stream = MemoryStream::for_read(data);
        let blocks =
            find_deflate_subblocks(&mut stream, &[ByteExtent::new(1, 3)]).unwrap();
        assert_eq!(blocks, [BitExtent::new(8, 10), BitExtent::new(18, 14)]);
    }

    #[test]
    fn partially_consumed_extent_is_rejected() {
        // A final empty block inside an extent with a trailing nonzero byte:
        // the byte after the stream end is never consumed.
        let data = vec![0x03, 0x00, 0x55];
        let mut stream = MemoryStream::for_read(data);
        let err =
            find_deflate_subblocks(&mut stream, &[ByteExtent::new(0, 3)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn puff_locations_for_shared_byte_blocks() {
        let data = vec![0xAA, 0xBB, 0x02, 0x0C, 0x00, 0xCC, 0xDD, 0xEE];
        let mut stream = MemoryStream::for_read(data);
        let deflates = [BitExtent::new(16, 10), BitExtent::new(26, 14)];
        let (puffs, size) = find_puff_locations(&mut stream, &deflates).unwrap();

        // Each empty fixed block puffs to 5 bytes: metadata record (3) plus
        // end-of-block record (2). The shared byte collapses the two puffs
        // into adjacency.
        assert_eq!(puffs, [ByteExtent::new(2, 5), ByteExtent::new(7, 5)]);
        // 2 raw prefix bytes + 10 puff bytes + 3 raw suffix bytes.
        assert_eq!(size, 15);
    }

    #[test]
    fn corrupt_zlib_header_is_rejected() {
        let data = vec![0x78, 0x00, 0, 0, 0, 0, 0, 0];
        let mut stream = MemoryStream::for_read(data);
        let err =
            locate_deflates_in_zlib_blocks(&mut stream, &[ByteExtent::new(0, 8)]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

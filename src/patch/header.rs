// Puffin patch envelope.
//
// Layout:
//
//   +-------+------------------+-------------+-------------------+
//   |P|U|F|1| header size (BE) | PatchHeader | inner patch bytes |
//   +-------+------------------+-------------+-------------------+
//
// The header serializes with varints: version, then the source and
// destination stream descriptions (deflate bit extents, puff byte extents,
// total puff length each). The inner patch is opaque to this layer.

use std::io::Write;

use crate::error::{Error, Result};
use crate::extent::{BitExtent, ByteExtent};
use crate::patch::varint;

pub const PATCH_MAGIC: [u8; 4] = *b"PUF1";

/// Supported envelope version.
pub const PATCH_VERSION: u64 = 1;

/// Everything the patch needs to know about one side of the transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamInfo {
    /// Deflate locations in the deflate stream, in bits.
    pub deflates: Vec<BitExtent>,
    /// Puff locations in the puff stream, in bytes.
    pub puffs: Vec<ByteExtent>,
    /// Total size of the puff stream.
    pub puff_length: u64,
}

/// Parsed patch header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchHeader {
    pub src: StreamInfo,
    pub dst: StreamInfo,
}

impl StreamInfo {
    fn encode<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        varint::write_u64(w, self.deflates.len() as u64)?;
        for d in &self.deflates {
            varint::write_u64(w, d.offset)?;
            varint::write_u64(w, d.length)?;
        }
        varint::write_u64(w, self.puffs.len() as u64)?;
        for p in &self.puffs {
            varint::write_u64(w, p.offset)?;
            varint::write_u64(w, p.length)?;
        }
        varint::write_u64(w, self.puff_length)
    }

    fn decode(cursor: &mut Cursor<'_>) -> Result<Self> {
        let ndeflates = cursor.read_count()?;
        let mut deflates = Vec::with_capacity(ndeflates);
        for _ in 0..ndeflates {
            let offset = cursor.read_u64()?;
            let length = cursor.read_u64()?;
            deflates.push(BitExtent::new(offset, length));
        }
        let npuffs = cursor.read_count()?;
        let mut puffs = Vec::with_capacity(npuffs);
        for _ in 0..npuffs {
            let offset = cursor.read_u64()?;
            let length = cursor.read_u64()?;
            puffs.push(ByteExtent::new(offset, length));
        }
        let puff_length = cursor.read_u64()?;
        Ok(Self {
            deflates,
            puffs,
            puff_length,
        })
    }
}

impl PatchHeader {
    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        varint::write_u64(&mut out, PATCH_VERSION)?;
        self.src.encode(&mut out)?;
        self.dst.encode(&mut out)?;
        Ok(out)
    }

    fn decode(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor { data, pos: 0 };
        let version = cursor.read_u64()?;
        if version != PATCH_VERSION {
            return Err(Error::invalid(format!("unsupported patch version: {version}")));
        }
        let src = StreamInfo::decode(&mut cursor)?;
        let dst = StreamInfo::decode(&mut cursor)?;
        if cursor.pos != data.len() {
            return Err(Error::invalid("trailing bytes after patch header"));
        }
        Ok(Self { src, dst })
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn read_u64(&mut self) -> Result<u64> {
        let (val, used) = varint::read_u64(&self.data[self.pos..])
            .map_err(|_| Error::invalid("truncated patch header"))?;
        self.pos += used;
        Ok(val)
    }

    fn read_count(&mut self) -> Result<usize> {
        let val = self.read_u64()?;
        // An extent list longer than the header itself is corrupt.
        if val > self.data.len() as u64 {
            return Err(Error::invalid("corrupt extent count in patch header"));
        }
        Ok(val as usize)
    }
}

/// Wrap an inner patch in the puffin envelope.
pub fn write_patch(header: &PatchHeader, inner: &[u8]) -> Result<Vec<u8>> {
    let encoded = header.encode()?;
    let header_size = u32::try_from(encoded.len())
        .map_err(|_| Error::invalid("patch header too large"))?;

    let mut patch = Vec::with_capacity(8 + encoded.len() + inner.len());
    patch.extend_from_slice(&PATCH_MAGIC);
    patch.extend_from_slice(&header_size.to_be_bytes());
    patch.extend_from_slice(&encoded);
    patch.extend_from_slice(inner);
    Ok(patch)
}

/// Split a puffin patch into its header and the opaque inner patch.
pub fn parse_patch(patch: &[u8]) -> Result<(PatchHeader, &[u8])> {
    if patch.len() < 8 {
        return Err(Error::InsufficientInput);
    }
    if patch[..4] != PATCH_MAGIC {
        return Err(Error::invalid(format!(
            "bad patch magic: {:02x?}",
            &patch[..4]
        )));
    }
    let header_size = u32::from_be_bytes([patch[4], patch[5], patch[6], patch[7]]) as usize;
    if patch.len() < 8 + header_size {
        return Err(Error::InsufficientInput);
    }
    let header = PatchHeader::decode(&patch[8..8 + header_size])?;
    Ok((header, &patch[8 + header_size..]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

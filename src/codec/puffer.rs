// The Puffer: DEFLATE bit stream -> typed puff record stream.
//
// Every bit of the input is either re-expressed as a record or captured in a
// block header (boundary bits), so the Huffer can reconstruct the original
// stream exactly. The block loop also ends cleanly when fewer than 3 bits
// remain without a final bit seen, which is what lets a single mid-stream
// sub-block be puffed on its own.

use log::{debug, warn};

use crate::codec::bitio::BitReader;
use crate::codec::deflate::{BlockType, LENGTH_BASES, LENGTH_EXTRA_BITS};
use crate::codec::deflate::{DISTANCE_BASES, DISTANCE_EXTRA_BITS};
use crate::codec::huffman::HuffmanTable;
use crate::codec::puffio::{MAX_BLOCK_METADATA, PuffData, PuffWriter};
use crate::error::{Error, Result};
use crate::extent::BitExtent;

/// DEFLATE -> puff engine. Owns its Huffman-table scratch, so one instance
/// must not be shared across concurrent callers.
#[derive(Default)]
pub struct Puffer {
    dyn_ht: HuffmanTable,
    fix_ht: HuffmanTable,
    metadata: Vec<u8>,
}

impl Puffer {
    pub fn new() -> Self {
        Self {
            dyn_ht: HuffmanTable::new(),
            fix_ht: HuffmanTable::new(),
            metadata: vec![0u8; MAX_BLOCK_METADATA],
        }
    }

    /// Decode a deflate bit stream into puff records.
    pub fn puff_deflate(&mut self, br: &mut BitReader<'_>, pw: &mut PuffWriter<'_>) -> Result<()> {
        self.puff_impl(br, pw, None)
    }

    /// Same as [`puff_deflate`](Self::puff_deflate), also collecting the bit
    /// extent of each deflate block relative to the reader start.
    pub fn puff_deflate_with_subblocks(
        &mut self,
        br: &mut BitReader<'_>,
        pw: &mut PuffWriter<'_>,
        subblocks: &mut Vec<BitExtent>,
    ) -> Result<()> {
        self.puff_impl(br, pw, Some(subblocks))
    }

    fn puff_impl(
        &mut self,
        br: &mut BitReader<'_>,
        pw: &mut PuffWriter<'_>,
        mut subblocks: Option<&mut Vec<BitExtent>>,
    ) -> Result<()> {
        if self.metadata.len() < MAX_BLOCK_METADATA {
            self.metadata.resize(MAX_BLOCK_METADATA, 0);
        }
        let mut final_bit = 0u32;
        // No final bit seen and no room for another block header: done.
        // Mid-stream sub-blocks end exactly here.
        while final_bit == 0 && br.cache_bits(3).is_ok() {
            let start_bit = br.bit_offset();
            final_bit = br.read_bits(1);
            br.drop_bits(1);
            let type_bits = br.read_bits(2);
            br.drop_bits(2);
            let block_type = BlockType::from_bits(type_bits)?;
            debug!("puffing {block_type} block, final={final_bit}");

            // Header byte: final_bit(1) | type(2) | skipped boundary bits(5).
            let mut header = ((final_bit as u8) << 7) | ((type_bits as u8) << 5);

            match block_type {
                BlockType::Uncompressed => {
                    let skipped = br.read_boundary_bits()?;
                    br.skip_boundary_bits()?;
                    if skipped > 0x1F {
                        return Err(Error::invalid("nonzero boundary bits exceed header field"));
                    }
                    header |= skipped;

                    br.cache_bits(32)?;
                    let len = br.read_bits(16);
                    br.drop_bits(16);
                    let nlen = br.read_bits(16);
                    br.drop_bits(16);
                    if len ^ nlen != 0xFFFF {
                        return Err(Error::invalid(format!(
                            "stored block length corrupt: LEN={len} NLEN={nlen}"
                        )));
                    }

                    pw.insert(PuffData::BlockMetadata(&[header]))?;
                    pw.insert(PuffData::Literals(br.read_bytes(len as usize)?))?;
                    pw.insert(PuffData::EndOfBlock { trailing_bits: 0 })?;
                    if let Some(blocks) = subblocks.as_mut() {
                        blocks.push(BitExtent::new(start_bit, br.bit_offset() - start_bit));
                    }
                    continue;
                }
                BlockType::Fixed => {
                    self.fix_ht.build_fixed()?;
                    pw.insert(PuffData::BlockMetadata(&[header]))?;
                }
                BlockType::Dynamic => {
                    self.metadata[0] = header;
                    let used = self.dyn_ht.build_dynamic(br, &mut self.metadata[1..])?;
                    pw.insert(PuffData::BlockMetadata(&self.metadata[..1 + used]))?;
                }
            }
            let cur_ht = match block_type {
                BlockType::Fixed => &self.fix_ht,
                _ => &self.dyn_ht,
            };

            loop {
                // Near the stream end the full max-length cache can fail
                // while the (shorter) end-of-block code still fits.
                let mut max = cur_ht.lit_len_max_bits();
                if br.cache_bits(max).is_err() {
                    max = cur_ht.end_of_block_bit_length()?;
                    br.cache_bits(max)
                        .map_err(|_| Error::InsufficientInput)?;
                }
                let bits = br.read_bits(max);
                let (symbol, nbits) = cur_ht.lit_len_alphabet(bits, max)?;
                br.drop_bits(nbits);

                if symbol < 256 {
                    pw.insert(PuffData::Literal(symbol as u8))?;
                } else if symbol == 256 {
                    let trailing_bits = if final_bit == 1 {
                        let bits = br.read_boundary_bits()?;
                        br.skip_boundary_bits()?;
                        bits
                    } else {
                        0
                    };
                    pw.insert(PuffData::EndOfBlock { trailing_bits })?;
                    break;
                } else {
                    if symbol > 285 {
                        return Err(Error::invalid(format!("invalid lit/len symbol: {symbol}")));
                    }
                    let index = usize::from(symbol - 257);
                    let mut extra = 0;
                    let extra_bits = LENGTH_EXTRA_BITS[index];
                    if extra_bits > 0 {
                        br.cache_bits(extra_bits)?;
                        extra = br.read_bits(extra_bits);
                        br.drop_bits(extra_bits);
                    }
                    let length = LENGTH_BASES[index] + extra as u16;

                    let mut dmax = cur_ht.distance_max_bits();
                    if br.cache_bits(dmax).is_err() {
                        dmax = br.bits_remaining().min(32) as u32;
                        if dmax == 0 {
                            return Err(Error::InsufficientInput);
                        }
                        br.cache_bits(dmax)?;
                    }
                    let dbits = br.read_bits(dmax);
                    let (dsymbol, dnbits) = cur_ht.distance_alphabet(dbits, dmax)?;
                    br.drop_bits(dnbits);
                    if dsymbol > 29 {
                        return Err(Error::invalid(format!(
                            "invalid distance symbol: {dsymbol}"
                        )));
                    }
                    let dindex = usize::from(dsymbol);
                    let mut dextra = 0;
                    let dextra_bits = DISTANCE_EXTRA_BITS[dindex];
                    if dextra_bits > 0 {
                        br.cache_bits(dextra_bits)?;
                        dextra = br.read_bits(dextra_bits);
                        br.drop_bits(dextra_bits);
                    }
                    let distance = DISTANCE_BASES[dindex] + dextra as u16;
                    pw.insert(PuffData::LenDist { length, distance })?;
                }
            }
            if let Some(blocks) = subblocks.as_mut() {
                blocks.push(BitExtent::new(start_bit, br.bit_offset() - start_bit));
            }
        }
        Ok(())
    }

    /// Puff a whole deflate buffer into `out`, returning the puff size.
    /// Verifies the entire input was consumed.
    pub fn puff_buffer(&mut self, comp: &[u8], out: &mut [u8]) -> Result<usize> {
        let mut br = BitReader::new(comp);
        let mut pw = PuffWriter::new(out);
        self.puff_deflate(&mut br, &mut pw)?;
        if br.offset() != comp.len() {
            return Err(Error::invalid(format!(
                "deflate stream not fully consumed: {} of {} bytes",
                br.offset(),
                comp.len()
            )));
        }
        pw.flush()?;
        Ok(pw.size())
    }

    /// Puff a whole deflate buffer into a freshly sized vector. The puff
    /// size is unknown up front, so the scratch starts at `2 * len + 100`
    /// and doubles on `InsufficientOutput`.
    pub fn puff_to_vec(&mut self, comp: &[u8]) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; comp.len() * 2 + 100];
        loop {
            match self.puff_buffer(comp, &mut buf) {
                Ok(size) => {
                    buf.truncate(size);
                    return Ok(buf);
                }
                Err(Error::InsufficientOutput) => {
                    warn!(
                        "insufficient puff buffer: {}, retrying with {}",
                        buf.len(),
                        buf.len() * 2
                    );
                    let doubled = buf.len() * 2;
                    buf.resize(doubled, 0);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::puffio::PuffReader;

    fn puff(comp: &[u8]) -> Vec<u8> {
        Puffer::new().puff_to_vec(comp).unwrap()
    }

    fn records(puffed: &[u8]) -> Vec<String> {
        let mut pr = PuffReader::new(puffed);
        let mut out = Vec::new();
        while pr.bytes_left() > 0 {
            out.push(match pr.next_record().unwrap() {
                PuffData::BlockMetadata(md) => format!("meta:{:02x},len={}", md[0], md.len()),
                PuffData::Literals(bytes) => format!("lits:{bytes:02x?}"),
                PuffData::LenDist { length, distance } => format!("lendist:{length},{distance}"),
                PuffData::EndOfBlock { trailing_bits } => format!("eob:{trailing_bits}"),
                PuffData::Literal(_) => unreachable!("reader coalesces literals"),
            });
        }
        out
    }

    #[test]
    fn stored_block() {
        // Final stored block, LEN=2, payload 11 22.
        let comp = [0x01, 0x02, 0x00, 0xFD, 0xFF, 0x11, 0x22];
        let puffed = puff(&comp);
        assert_eq!(
            records(&puffed),
            ["meta:80,len=1", "lits:[11, 22]", "eob:0"]
        );
    }

    #[test]
    fn stored_block_bad_nlen() {
        let comp = [0x01, 0x02, 0x00, 0xFD, 0xFE, 0x11, 0x22];
        let err = Puffer::new().puff_to_vec(&comp).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn fixed_block_single_literal() {
        // Final fixed block holding literal 'a'.
        let comp = [0x4B, 0x04, 0x00];
        let puffed = puff(&comp);
        assert_eq!(records(&puffed), ["meta:a0,len=1", "lits:[61]", "eob:0"]);
    }

    #[test]
    fn empty_final_fixed_block() {
        let comp = [0x03, 0x00];
        let puffed = puff(&comp);
        assert_eq!(records(&puffed), ["meta:a0,len=1", "eob:0"]);
    }

    #[test]
    fn reserved_block_type_is_invalid() {
        // Bits: final=1, type=11.
        let comp = [0x07, 0x00];
        let err = Puffer::new().puff_to_vec(&comp).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn truncated_stream_is_insufficient() {
        // Fixed block cut off before its end-of-block code.
        let comp = [0x4B];
        let err = Puffer::new().puff_to_vec(&comp).unwrap_err();
        assert!(matches!(err, Error::InsufficientInput));
    }

    #[test]
    fn subblock_extents_cover_the_stream() {
        // Two fixed blocks sharing byte 1: bits [0,10) and [10,24).
        let comp = [0x02, 0x0C, 0x00];
        let mut puffer = Puffer::new();
        let mut pw = PuffWriter::sink();
        let mut br = BitReader::new(&comp);
        let mut blocks = Vec::new();
        puffer
            .puff_deflate_with_subblocks(&mut br, &mut pw, &mut blocks)
            .unwrap();
        pw.flush().unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], BitExtent::new(0, 10));
        // The final block's extent absorbs the trailing boundary bits.
        assert_eq!(blocks[1], BitExtent::new(10, 14));
    }

    #[test]
    fn puff_is_deterministic() {
        let comp = [0x4B, 0x04, 0x00];
        assert_eq!(puff(&comp), puff(&comp));
    }

    #[test]
    fn sink_size_allows_exact_allocation() {
        let comp = [0x01, 0x02, 0x00, 0xFD, 0xFF, 0x11, 0x22];
        let mut puffer = Puffer::new();
        let mut sink = PuffWriter::sink();
        let mut br = BitReader::new(&comp);
        puffer.puff_deflate(&mut br, &mut sink).unwrap();
        sink.flush().unwrap();

        let mut exact = vec![0u8; sink.size()];
        let size = puffer.puff_buffer(&comp, &mut exact).unwrap();
        assert_eq!(size, exact.len());
    }
}

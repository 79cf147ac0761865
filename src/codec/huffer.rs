// The Huffer: typed puff record stream -> DEFLATE bit stream.
//
// Exact inverse of the Puffer. It never pads the output on its own: the
// byte-buffer wrapper flushes, and the huff-side PuffinStream manages
// partial bytes shared between adjacent deflates itself.

use log::debug;

use crate::codec::bitio::BitWriter;
use crate::codec::deflate::{
    BlockType, DISTANCE_BASES, DISTANCE_EXTRA_BITS, LENGTH_BASES, LENGTH_EXTRA_BITS,
    distance_code_index, length_code_index,
};
use crate::codec::huffman::HuffmanTable;
use crate::codec::puffio::{PuffData, PuffReader};
use crate::error::{Error, Result};

/// Puff -> DEFLATE engine. Owns its Huffman-table scratch, so one instance
/// must not be shared across concurrent callers.
#[derive(Default)]
pub struct Huffer {
    dyn_ht: HuffmanTable,
    fix_ht: HuffmanTable,
}

impl Huffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a puff record stream back into deflate bits. Consumes records
    /// until the reader is drained.
    pub fn huff_deflate(&mut self, pr: &mut PuffReader<'_>, bw: &mut BitWriter<'_>) -> Result<()> {
        while pr.bytes_left() > 0 {
            let PuffData::BlockMetadata(metadata) = pr.next_record()? else {
                return Err(Error::invalid("expected block metadata"));
            };
            let header = metadata[0];
            let final_bit = u32::from(header >> 7);
            let type_bits = u32::from((header >> 5) & 0x3);
            let block_type = BlockType::from_bits(type_bits)?;
            let skipped_bits = header & 0x1F;
            debug!("huffing {block_type} block, final={final_bit}");

            bw.write_bits(1, final_bit)?;
            bw.write_bits(2, type_bits)?;

            let mut uncompressed = false;
            match block_type {
                BlockType::Uncompressed => {
                    bw.write_boundary_bits(skipped_bits)?;
                    uncompressed = true;
                }
                BlockType::Fixed => self.fix_ht.build_fixed_encode()?,
                BlockType::Dynamic => self
                    .dyn_ht
                    .build_dynamic_from_preamble(&metadata[1..], bw)?,
            }
            let cur_ht = match block_type {
                BlockType::Fixed => &self.fix_ht,
                _ => &self.dyn_ht,
            };

            // Records until the end of the block.
            let mut wrote_stored_len = false;
            loop {
                match pr.next_record()? {
                    PuffData::Literal(byte) => {
                        if uncompressed {
                            return Err(Error::invalid("literal inside stored block"));
                        }
                        let (code, nbits) = cur_ht.lit_len_huffman(usize::from(byte))?;
                        bw.write_bits(nbits, code)?;
                    }
                    PuffData::Literals(bytes) => {
                        if uncompressed {
                            if wrote_stored_len {
                                return Err(Error::invalid("multiple runs in stored block"));
                            }
                            wrote_stored_len = true;
                            let len = bytes.len() as u32;
                            bw.write_bits(16, len)?;
                            bw.write_bits(16, !len)?;
                            bw.write_bytes(bytes)?;
                        } else {
                            for &byte in bytes {
                                let (code, nbits) = cur_ht.lit_len_huffman(usize::from(byte))?;
                                bw.write_bits(nbits, code)?;
                            }
                        }
                    }
                    PuffData::LenDist { length, distance } => {
                        if uncompressed {
                            return Err(Error::invalid("back-reference inside stored block"));
                        }
                        let index = length_code_index(length)?;
                        let (code, nbits) = cur_ht.lit_len_huffman(index + 257)?;
                        bw.write_bits(nbits, code)?;
                        let extra_bits = LENGTH_EXTRA_BITS[index];
                        if extra_bits > 0 {
                            bw.write_bits(extra_bits, u32::from(length - LENGTH_BASES[index]))?;
                        }

                        let dindex = distance_code_index(distance)?;
                        let (dcode, dnbits) = cur_ht.distance_huffman(dindex)?;
                        bw.write_bits(dnbits, dcode)?;
                        let dextra_bits = DISTANCE_EXTRA_BITS[dindex];
                        if dextra_bits > 0 {
                            bw.write_bits(
                                dextra_bits,
                                u32::from(distance - DISTANCE_BASES[dindex]),
                            )?;
                        }
                    }
                    PuffData::EndOfBlock { trailing_bits } => {
                        if uncompressed {
                            if !wrote_stored_len {
                                // A zero-length stored block has no run.
                                bw.write_bits(16, 0)?;
                                bw.write_bits(16, 0xFFFF)?;
                            }
                        } else {
                            let (code, nbits) = cur_ht.lit_len_huffman(256)?;
                            bw.write_bits(nbits, code)?;
                            if final_bit == 1 {
                                bw.write_boundary_bits(trailing_bits)?;
                            }
                        }
                        break;
                    }
                    PuffData::BlockMetadata(_) => {
                        return Err(Error::invalid("unexpected block metadata"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Huff a whole puff buffer into `comp`, returning the deflate size in
    /// bytes (trailing byte zero-padded).
    pub fn huff_buffer(&mut self, puff: &[u8], comp: &mut [u8]) -> Result<usize> {
        let mut pr = PuffReader::new(puff);
        let mut bw = BitWriter::new(comp);
        self.huff_deflate(&mut pr, &mut bw)?;
        bw.flush()?;
        Ok(bw.size())
    }
}

// Canonical DEFLATE Huffman tables (RFC 1951 §3.2).
//
// One table object serves both directions: the decode side turns bit
// patterns into alphabet symbols for the Puffer, the encode side turns
// symbols back into bit patterns for the Huffer. Fixed tables come from
// §3.2.6; dynamic tables are parsed out of a block preamble.
//
// Dynamic preambles are never re-derived from code lengths — multiple
// preambles encode the same tree, so a rebuilt preamble would not be
// bit-identical. Instead the decode side emits a byte-aligned serialization
// that embeds the original RLE section verbatim:
//
//   byte 0: HLIT   (lit/len code count - 257)
//   byte 1: HDIST  (distance code count - 1)
//   byte 2: HCLEN  (code-length code count - 4)
//   bytes 3..: LSB-first bit-packed: (HCLEN+4) x 3-bit code-length-code
//              lengths in wire order, then the RLE-coded code-length
//              section copied bit-for-bit, zero-padded to a byte boundary.
//
// The encode side replays those bits while re-parsing them, which makes the
// round trip a plain bit copy.

use log::debug;

use crate::codec::bitio::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Longest lit/len or distance code.
const MAX_CODE_BITS: u32 = 15;
/// Longest code-length code.
const CL_MAX_BITS: u32 = 7;
/// Number of lit/len symbols (285 + the two reserved ones).
const LIT_LEN_SYMBOLS: usize = 288;
/// Number of distance symbols (29 + the two reserved ones).
const DISTANCE_SYMBOLS: usize = 32;

/// Wire order of the code-length-code lengths (RFC 1951 §3.2.7).
const CL_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

#[inline]
fn low_mask(n: u32) -> u32 {
    if n == 0 { 0 } else { u32::MAX >> (32 - n) }
}

// ---------------------------------------------------------------------------
// Canonical code construction
// ---------------------------------------------------------------------------

/// Decode tables: per-length counts plus symbols sorted canonically.
#[derive(Default)]
struct CanonicalDecoder {
    counts: [u16; (MAX_CODE_BITS + 1) as usize],
    symbols: Vec<u16>,
    max_bits: u32,
}

impl CanonicalDecoder {
    fn build(&mut self, lengths: &[u8]) -> Result<()> {
        self.counts.fill(0);
        self.max_bits = 0;
        for &len in lengths {
            if u32::from(len) > MAX_CODE_BITS {
                return Err(Error::invalid(format!("code length too long: {len}")));
            }
            if len > 0 {
                self.counts[usize::from(len)] += 1;
                self.max_bits = self.max_bits.max(u32::from(len));
            }
        }

        // Kraft check: reject over-subscribed length sets. Incomplete sets
        // are left to fail at decode time, as deflate permits a lone
        // distance code.
        let mut left: i32 = 1;
        for len in 1..=MAX_CODE_BITS as usize {
            left <<= 1;
            left -= i32::from(self.counts[len]);
            if left < 0 {
                return Err(Error::invalid("over-subscribed Huffman code lengths"));
            }
        }

        let mut offsets = [0usize; (MAX_CODE_BITS + 2) as usize];
        for len in 1..=MAX_CODE_BITS as usize {
            offsets[len + 1] = offsets[len] + usize::from(self.counts[len]);
        }
        self.symbols.clear();
        self.symbols
            .resize(offsets[(MAX_CODE_BITS + 1) as usize], 0);
        let mut next = offsets;
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                self.symbols[next[usize::from(len)]] = symbol as u16;
                next[usize::from(len)] += 1;
            }
        }
        Ok(())
    }

    /// Longest-prefix decode of the next symbol. `bits` holds up to `avail`
    /// upcoming bits LSB-first (the first stream bit in bit 0).
    fn decode(&self, bits: u32, avail: u32) -> Option<(u16, u32)> {
        let mut code: u32 = 0;
        let mut first: u32 = 0;
        let mut index: u32 = 0;
        for len in 1..=self.max_bits.min(avail) {
            code |= (bits >> (len - 1)) & 1;
            let count = u32::from(self.counts[len as usize]);
            let offset = code.wrapping_sub(first);
            if offset < count {
                return Some((self.symbols[(index + offset) as usize], len));
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        None
    }
}

/// Encode tables: per-symbol code bits, pre-reversed for LSB-first emission.
#[derive(Default)]
struct CanonicalEncoder {
    /// (reversed code, length); length 0 marks an absent symbol.
    codes: Vec<(u16, u8)>,
}

impl CanonicalEncoder {
    fn build(&mut self, lengths: &[u8]) -> Result<()> {
        let mut counts = [0u16; (MAX_CODE_BITS + 1) as usize];
        for &len in lengths {
            if u32::from(len) > MAX_CODE_BITS {
                return Err(Error::invalid(format!("code length too long: {len}")));
            }
            counts[usize::from(len)] += 1;
        }
        counts[0] = 0;

        let mut left: i32 = 1;
        for len in 1..=MAX_CODE_BITS as usize {
            left <<= 1;
            left -= i32::from(counts[len]);
            if left < 0 {
                return Err(Error::invalid("over-subscribed Huffman code lengths"));
            }
        }

        // RFC 1951 §3.2.2 next-code assignment.
        let mut next_code = [0u16; (MAX_CODE_BITS + 1) as usize];
        let mut code: u16 = 0;
        for len in 1..=MAX_CODE_BITS as usize {
            code = (code + counts[len - 1]) << 1;
            next_code[len] = code;
        }

        self.codes.clear();
        self.codes.resize(lengths.len(), (0, 0));
        for (symbol, &len) in lengths.iter().enumerate() {
            if len > 0 {
                let c = next_code[usize::from(len)];
                next_code[usize::from(len)] += 1;
                let reversed = (u32::from(c).reverse_bits() >> (32 - u32::from(len))) as u16;
                self.codes[symbol] = (reversed, len);
            }
        }
        Ok(())
    }

    fn code(&self, symbol: usize) -> Option<(u32, u32)> {
        match self.codes.get(symbol) {
            Some(&(bits, len)) if len > 0 => Some((u32::from(bits), u32::from(len))),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// HuffmanTable
// ---------------------------------------------------------------------------

/// Reusable fixed/dynamic Huffman table scratch, rebuilt per block.
#[derive(Default)]
pub struct HuffmanTable {
    lit_len_dec: CanonicalDecoder,
    dist_dec: CanonicalDecoder,
    lit_len_enc: CanonicalEncoder,
    dist_enc: CanonicalEncoder,
    /// Code length of lit/len symbol 256, 0 if absent.
    eob_bits: u32,
    fixed_decode_built: bool,
    fixed_encode_built: bool,
    lengths_scratch: Vec<u8>,
}

impl HuffmanTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn fixed_lengths() -> ([u8; LIT_LEN_SYMBOLS], [u8; DISTANCE_SYMBOLS]) {
        let mut lit_len = [0u8; LIT_LEN_SYMBOLS];
        for (symbol, len) in lit_len.iter_mut().enumerate() {
            *len = match symbol {
                0..=143 => 8,
                144..=255 => 9,
                256..=279 => 7,
                _ => 8,
            };
        }
        (lit_len, [5u8; DISTANCE_SYMBOLS])
    }

    /// Populate the decode tables with the fixed codes of RFC 1951 §3.2.6.
    pub fn build_fixed(&mut self) -> Result<()> {
        if !self.fixed_decode_built {
            let (lit_len, dist) = Self::fixed_lengths();
            self.lit_len_dec.build(&lit_len)?;
            self.dist_dec.build(&dist)?;
            self.fixed_decode_built = true;
        }
        self.eob_bits = 7;
        Ok(())
    }

    /// Populate the encode tables with the fixed codes.
    pub fn build_fixed_encode(&mut self) -> Result<()> {
        if !self.fixed_encode_built {
            let (lit_len, dist) = Self::fixed_lengths();
            self.lit_len_enc.build(&lit_len)?;
            self.dist_enc.build(&dist)?;
            self.fixed_encode_built = true;
        }
        self.eob_bits = 7;
        Ok(())
    }

    /// Parse a dynamic-table preamble from the bit stream, building the
    /// decode tables and serializing the preamble into `meta` (the
    /// BlockMetadata payload). Returns the number of payload bytes used.
    pub fn build_dynamic(&mut self, br: &mut BitReader<'_>, meta: &mut [u8]) -> Result<usize> {
        self.fixed_decode_built = false;
        if meta.len() < 3 {
            return Err(Error::invalid("dynamic preamble exceeds metadata budget"));
        }

        br.cache_bits(14)?;
        let hlit = br.read_bits(5);
        br.drop_bits(5);
        let hdist = br.read_bits(5);
        br.drop_bits(5);
        let hclen = br.read_bits(4);
        br.drop_bits(4);
        if hlit > 29 {
            return Err(Error::invalid(format!("too many lit/len codes: {}", hlit + 257)));
        }
        if hdist > 29 {
            return Err(Error::invalid(format!("too many distance codes: {}", hdist + 1)));
        }
        let num_lit = (hlit + 257) as usize;
        let num_dist = (hdist + 1) as usize;
        let num_cl = (hclen + 4) as usize;
        debug!("dynamic preamble: hlit={hlit} hdist={hdist} hclen={hclen}");

        let (head, tail) = meta.split_at_mut(3);
        head[0] = hlit as u8;
        head[1] = hdist as u8;
        head[2] = hclen as u8;
        let mut packer = BitWriter::new(tail);
        let too_large = |e: Error| match e {
            Error::InsufficientOutput => Error::invalid("dynamic preamble exceeds metadata budget"),
            other => other,
        };

        let mut cl_lengths = [0u8; 19];
        for &position in CL_ORDER.iter().take(num_cl) {
            br.cache_bits(3)?;
            let len = br.read_bits(3);
            br.drop_bits(3);
            packer.write_bits(3, len).map_err(too_large)?;
            cl_lengths[position] = len as u8;
        }
        let mut cl_dec = CanonicalDecoder::default();
        cl_dec.build(&cl_lengths)?;

        let total = num_lit + num_dist;
        self.lengths_scratch.clear();
        self.lengths_scratch.resize(total, 0);
        let mut filled = 0usize;
        while filled < total {
            let (symbol, nbits, raw) = decode_cl_symbol(&cl_dec, br)?;
            packer.write_bits(nbits, raw).map_err(too_large)?;
            match symbol {
                0..=15 => {
                    self.lengths_scratch[filled] = symbol as u8;
                    filled += 1;
                }
                16 => {
                    if filled == 0 {
                        return Err(Error::invalid("length repeat with no previous length"));
                    }
                    br.cache_bits(2)?;
                    let extra = br.read_bits(2);
                    br.drop_bits(2);
                    packer.write_bits(2, extra).map_err(too_large)?;
                    let prev = self.lengths_scratch[filled - 1];
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, prev, 3 + extra)?;
                }
                17 => {
                    br.cache_bits(3)?;
                    let extra = br.read_bits(3);
                    br.drop_bits(3);
                    packer.write_bits(3, extra).map_err(too_large)?;
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, 0, 3 + extra)?;
                }
                18 => {
                    br.cache_bits(7)?;
                    let extra = br.read_bits(7);
                    br.drop_bits(7);
                    packer.write_bits(7, extra).map_err(too_large)?;
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, 0, 11 + extra)?;
                }
                _ => return Err(Error::invalid(format!("invalid length code: {symbol}"))),
            }
        }

        packer.flush().map_err(too_large)?;
        let used = 3 + packer.size();

        self.eob_bits = u32::from(self.lengths_scratch[256]);
        let (lit_lengths, dist_lengths) = self.lengths_scratch.split_at(num_lit);
        self.lit_len_dec.build(lit_lengths)?;
        self.dist_dec.build(dist_lengths)?;
        Ok(used)
    }

    /// Rebuild the encode tables from a serialized preamble, writing the
    /// original preamble bits into `bw`.
    pub fn build_dynamic_from_preamble(
        &mut self,
        meta: &[u8],
        bw: &mut BitWriter<'_>,
    ) -> Result<()> {
        self.fixed_encode_built = false;
        if meta.len() < 3 {
            return Err(Error::invalid("truncated dynamic preamble metadata"));
        }
        let hlit = u32::from(meta[0]);
        let hdist = u32::from(meta[1]);
        let hclen = u32::from(meta[2]);
        if hlit > 29 || hdist > 29 || hclen > 15 {
            return Err(Error::invalid("corrupt dynamic preamble metadata"));
        }
        let num_lit = (hlit + 257) as usize;
        let num_dist = (hdist + 1) as usize;
        let num_cl = (hclen + 4) as usize;

        bw.write_bits(5, hlit)?;
        bw.write_bits(5, hdist)?;
        bw.write_bits(4, hclen)?;

        // Truncated metadata is a malformed record, not reader underflow.
        let truncated = |e: Error| match e {
            Error::InsufficientInput => Error::invalid("truncated dynamic preamble metadata"),
            other => other,
        };

        let mut mr = BitReader::new(&meta[3..]);
        let mut cl_lengths = [0u8; 19];
        for &position in CL_ORDER.iter().take(num_cl) {
            mr.cache_bits(3).map_err(truncated)?;
            let len = mr.read_bits(3);
            mr.drop_bits(3);
            bw.write_bits(3, len)?;
            cl_lengths[position] = len as u8;
        }
        let mut cl_dec = CanonicalDecoder::default();
        cl_dec.build(&cl_lengths)?;

        let total = num_lit + num_dist;
        self.lengths_scratch.clear();
        self.lengths_scratch.resize(total, 0);
        let mut filled = 0usize;
        while filled < total {
            let (symbol, nbits, raw) = decode_cl_symbol(&cl_dec, &mut mr).map_err(truncated)?;
            bw.write_bits(nbits, raw)?;
            match symbol {
                0..=15 => {
                    self.lengths_scratch[filled] = symbol as u8;
                    filled += 1;
                }
                16 => {
                    if filled == 0 {
                        return Err(Error::invalid("length repeat with no previous length"));
                    }
                    mr.cache_bits(2).map_err(truncated)?;
                    let extra = mr.read_bits(2);
                    mr.drop_bits(2);
                    bw.write_bits(2, extra)?;
                    let prev = self.lengths_scratch[filled - 1];
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, prev, 3 + extra)?;
                }
                17 => {
                    mr.cache_bits(3).map_err(truncated)?;
                    let extra = mr.read_bits(3);
                    mr.drop_bits(3);
                    bw.write_bits(3, extra)?;
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, 0, 3 + extra)?;
                }
                18 => {
                    mr.cache_bits(7).map_err(truncated)?;
                    let extra = mr.read_bits(7);
                    mr.drop_bits(7);
                    bw.write_bits(7, extra)?;
                    filled = repeat_lengths(&mut self.lengths_scratch, filled, 0, 11 + extra)?;
                }
                _ => return Err(Error::invalid(format!("invalid length code: {symbol}"))),
            }
        }

        self.eob_bits = u32::from(self.lengths_scratch[256]);
        let (lit_lengths, dist_lengths) = self.lengths_scratch.split_at(num_lit);
        self.lit_len_enc.build(lit_lengths)?;
        self.dist_enc.build(dist_lengths)?;
        Ok(())
    }

    /// Decode the next lit/len symbol from up to `avail` upcoming bits.
    pub fn lit_len_alphabet(&self, bits: u32, avail: u32) -> Result<(u16, u32)> {
        self.lit_len_dec
            .decode(bits, avail)
            .ok_or_else(|| Error::invalid("no matching lit/len code"))
    }

    /// Decode the next distance symbol from up to `avail` upcoming bits.
    pub fn distance_alphabet(&self, bits: u32, avail: u32) -> Result<(u16, u32)> {
        self.dist_dec
            .decode(bits, avail)
            .ok_or_else(|| Error::invalid("no matching distance code"))
    }

    #[inline]
    pub fn lit_len_max_bits(&self) -> u32 {
        self.lit_len_dec.max_bits
    }

    #[inline]
    pub fn distance_max_bits(&self) -> u32 {
        self.dist_dec.max_bits
    }

    /// Length of the code for symbol 256, used when the stream is too short
    /// to cache a full `lit_len_max_bits` worth of bits.
    pub fn end_of_block_bit_length(&self) -> Result<u32> {
        if self.eob_bits == 0 {
            return Err(Error::invalid("table has no end-of-block code"));
        }
        Ok(self.eob_bits)
    }

    /// Code bits (pre-reversed for LSB-first writing) for a lit/len symbol.
    pub fn lit_len_huffman(&self, symbol: usize) -> Result<(u32, u32)> {
        self.lit_len_enc
            .code(symbol)
            .ok_or_else(|| Error::invalid(format!("lit/len symbol not in table: {symbol}")))
    }

    /// Code bits (pre-reversed) for a distance symbol.
    pub fn distance_huffman(&self, symbol: usize) -> Result<(u32, u32)> {
        self.dist_enc
            .code(symbol)
            .ok_or_else(|| Error::invalid(format!("distance symbol not in table: {symbol}")))
    }
}

/// Decode one code-length symbol, returning `(symbol, nbits, raw bits)` so
/// the caller can replay the exact bits elsewhere.
fn decode_cl_symbol(dec: &CanonicalDecoder, br: &mut BitReader<'_>) -> Result<(u16, u32, u32)> {
    let mut avail = dec.max_bits.min(CL_MAX_BITS);
    if br.cache_bits(avail).is_err() {
        avail = br.bits_remaining() as u32;
        if avail == 0 {
            return Err(Error::InsufficientInput);
        }
        br.cache_bits(avail)?;
    }
    let bits = br.read_bits(avail);
    let (symbol, nbits) = dec
        .decode(bits, avail)
        .ok_or_else(|| Error::invalid("no matching code-length code"))?;
    br.drop_bits(nbits);
    Ok((symbol, nbits, bits & low_mask(nbits)))
}

fn repeat_lengths(lengths: &mut [u8], filled: usize, value: u8, count: u32) -> Result<usize> {
    let count = count as usize;
    if filled + count > lengths.len() {
        return Err(Error::invalid("length repeat overruns the alphabet"));
    }
    lengths[filled..filled + count].fill(value);
    Ok(filled + count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_table_known_codes() {
        let mut ht = HuffmanTable::new();
        ht.build_fixed().unwrap();
        ht.build_fixed_encode().unwrap();
        assert_eq!(ht.lit_len_max_bits(), 9);
        assert_eq!(ht.distance_max_bits(), 5);
        assert_eq!(ht.end_of_block_bit_length().unwrap(), 7);

        // Symbol 0 is the 8-bit code 0011_0000; reversed 0000_1100.
        assert_eq!(ht.lit_len_huffman(0).unwrap(), (0b0000_1100, 8));
        // Symbol 256 is the 7-bit all-zero code.
        assert_eq!(ht.lit_len_huffman(256).unwrap(), (0, 7));
        // Symbol 144 is the first 9-bit code, 1_1001_0000; reversed.
        assert_eq!(ht.lit_len_huffman(144).unwrap(), (0b0_0000_1001_1, 9));
        // Distance codes are plain 5-bit values.
        assert_eq!(ht.distance_huffman(0).unwrap(), (0, 5));
        assert_eq!(ht.distance_huffman(1).unwrap(), (0b10000, 5));
    }

    #[test]
    fn fixed_decode_inverts_encode() {
        let mut ht = HuffmanTable::new();
        ht.build_fixed().unwrap();
        ht.build_fixed_encode().unwrap();
        for symbol in 0..LIT_LEN_SYMBOLS {
            let (bits, nbits) = ht.lit_len_huffman(symbol).unwrap();
            let (decoded, used) = ht.lit_len_alphabet(bits, nbits).unwrap();
            assert_eq!(usize::from(decoded), symbol);
            assert_eq!(used, nbits);
        }
        for symbol in 0..DISTANCE_SYMBOLS {
            let (bits, nbits) = ht.distance_huffman(symbol).unwrap();
            let (decoded, used) = ht.distance_alphabet(bits, nbits).unwrap();
            assert_eq!(usize::from(decoded), symbol);
            assert_eq!(used, nbits);
        }
    }

    #[test]
    fn over_subscribed_lengths_are_rejected() {
        let mut dec = CanonicalDecoder::default();
        // Three 1-bit codes cannot exist.
        assert!(dec.build(&[1, 1, 1]).is_err());
        let mut enc = CanonicalEncoder::default();
        assert!(enc.build(&[1, 1, 1]).is_err());
    }

    #[test]
    fn incomplete_code_fails_only_at_decode() {
        let mut dec = CanonicalDecoder::default();
        // A lone 1-bit code: legal (deflate allows a single distance code).
        dec.build(&[1]).unwrap();
        assert_eq!(dec.decode(0b0, 1), Some((0, 1)));
        assert_eq!(dec.decode(0b1, 1), None);
    }

    /// Build the bit stream of a small dynamic preamble: two 1-bit lit/len
    /// codes (symbols 0 and 256) and a single 1-bit distance code.
    fn sample_preamble_bits() -> Vec<u8> {
        let mut buf = vec![0u8; 64];
        let mut bw = BitWriter::new(&mut buf);
        bw.write_bits(5, 0).unwrap(); // HLIT: 257 codes
        bw.write_bits(5, 0).unwrap(); // HDIST: 1 code
        bw.write_bits(4, 14).unwrap(); // HCLEN: 18 entries
        // Code-length-code lengths in wire order 16,17,18,0,8,...,14,1:
        // symbols 0, 1 and 18 get 2-bit codes (canonical: 0=00, 1=01, 18=10).
        let cl = [0, 0, 2, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];
        for len in cl {
            bw.write_bits(3, len).unwrap();
        }
        let one = 0b10u32; // symbol 1, code 01 MSB-first -> bits 0,1
        let rep18 = 0b01u32; // symbol 18, code 10 MSB-first -> bits 1,0
        bw.write_bits(2, one).unwrap(); // lit 0 -> length 1
        bw.write_bits(2, rep18).unwrap();
        bw.write_bits(7, 127).unwrap(); // 138 zeros
        bw.write_bits(2, rep18).unwrap();
        bw.write_bits(7, 106).unwrap(); // 117 zeros
        bw.write_bits(2, one).unwrap(); // lit 256 -> length 1
        bw.write_bits(2, one).unwrap(); // distance 0 -> length 1
        bw.flush().unwrap();
        let size = bw.size();
        buf.truncate(size);
        buf
    }

    #[test]
    fn dynamic_preamble_roundtrips_bit_for_bit() {
        let input = sample_preamble_bits();
        let mut br = BitReader::new(&input);
        let mut meta = [0u8; 137];
        let mut ht = HuffmanTable::new();
        let used = ht.build_dynamic(&mut br, &mut meta).unwrap();
        assert!(used >= 3);
        assert!(br.bits_remaining() < 8, "parse must stop inside the pad");

        // Decode side built the expected trees.
        assert_eq!(ht.lit_len_max_bits(), 1);
        assert_eq!(ht.end_of_block_bit_length().unwrap(), 1);
        assert_eq!(ht.lit_len_alphabet(0b0, 1).unwrap(), (0, 1));
        assert_eq!(ht.lit_len_alphabet(0b1, 1).unwrap(), (256, 1));
        assert_eq!(ht.distance_alphabet(0b0, 1).unwrap(), (0, 1));

        // Encode side regenerates the exact input bits.
        let mut out = vec![0u8; input.len()];
        let mut bw = BitWriter::new(&mut out);
        let mut ht2 = HuffmanTable::new();
        ht2.build_dynamic_from_preamble(&meta[..used], &mut bw)
            .unwrap();
        bw.flush().unwrap();
        let size = bw.size();
        assert_eq!(&out[..size], &input[..size]);

        assert_eq!(ht2.lit_len_huffman(0).unwrap(), (0, 1));
        assert_eq!(ht2.lit_len_huffman(256).unwrap(), (1, 1));
        assert_eq!(ht2.distance_huffman(0).unwrap(), (0, 1));
        assert!(ht2.lit_len_huffman(10).is_err());
    }

    #[test]
    fn corrupt_preamble_metadata_is_invalid_input() {
        let mut ht = HuffmanTable::new();
        let mut out = [0u8; 16];
        let mut bw = BitWriter::new(&mut out);
        assert!(matches!(
            ht.build_dynamic_from_preamble(&[], &mut bw),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            ht.build_dynamic_from_preamble(&[30, 0, 0], &mut bw),
            Err(Error::InvalidInput(_))
        ));
        // Counts promise more RLE data than the payload holds.
        assert!(matches!(
            ht.build_dynamic_from_preamble(&[0, 0, 14, 0x48], &mut bw),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn repeat_with_no_previous_length_is_rejected() {
        // HCLEN covers symbol 16; first RLE symbol is a repeat.
        let mut buf = vec![0u8; 16];
        let mut bw = BitWriter::new(&mut buf);
        bw.write_bits(5, 0).unwrap();
        bw.write_bits(5, 0).unwrap();
        bw.write_bits(4, 0).unwrap(); // 4 cl entries: 16,17,18,0
        bw.write_bits(3, 1).unwrap(); // symbol 16: length 1
        bw.write_bits(3, 1).unwrap(); // symbol 17: length 1
        bw.write_bits(3, 0).unwrap();
        bw.write_bits(3, 0).unwrap();
        bw.write_bits(1, 0).unwrap(); // symbol 16 (code 0), no previous
        bw.flush().unwrap();
        let size = bw.size();

        let mut br = BitReader::new(&buf[..size]);
        let mut meta = [0u8; 137];
        let mut ht = HuffmanTable::new();
        assert!(matches!(
            ht.build_dynamic(&mut br, &mut meta),
            Err(Error::InvalidInput(_))
        ));
    }
}

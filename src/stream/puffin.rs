// PuffinStream: a byte stream exposing the imaginary fully-puffed view of a
// deflate-backed stream.
//
// The puff stream does not exist anywhere; it is materialized per deflate
// extent on read, and huffed back per extent on write. Deflates are bit
// extents, so two adjacent deflates may share a byte:
//
// - a deflate whose tail ends mid-byte followed bit-contiguously by the next
//   deflate hands the partial byte over in `last_byte`;
// - a deflate whose tail ends mid-byte next to raw data appears in the puff
//   stream as the puff followed by the full shared byte verbatim; huffing
//   consumes that byte as one extra and merges its high bits back in;
// - a deflate whose head starts mid-byte after raw data takes its low bits
//   from the raw byte that was already emitted.
//
// One instance serves reading or writing, never both.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::codec::bitio::{BitReader, BitWriter};
use crate::codec::huffer::Huffer;
use crate::codec::puffer::Puffer;
use crate::codec::puffio::{PuffReader, PuffWriter};
use crate::error::{Error, Result};
use crate::extent::{BitExtent, ByteExtent};
use crate::stream::ByteStream;

/// Virtual puff view over a deflate-backed stream.
pub struct PuffinStream<S: ByteStream> {
    stream: S,
    puffer: Option<Rc<RefCell<Puffer>>>,
    huffer: Option<Rc<RefCell<Huffer>>>,
    puff_stream_size: u64,
    deflates: Vec<BitExtent>,
    puffs: Vec<ByteExtent>,

    /// Head bits of deflate i continue the previous deflate's shared byte.
    shared_head: Vec<bool>,
    /// Huffing extent i consumes one extra raw byte to finish its tail byte.
    extra_byte: Vec<bool>,

    /// Position in the imaginary puff stream.
    pos: u64,
    /// Extent currently held in `puff_buffer` (read side).
    cached_extent: Option<usize>,

    /// Next extent to fill (write side).
    cur: usize,
    /// Bytes accumulated for the current extent (write side).
    skip_bytes: u64,
    /// Carried partial or raw byte at a deflate boundary (write side).
    last_byte: u8,

    closed: bool,
    puff_buffer: Vec<u8>,
    deflate_buffer: Vec<u8>,
}

impl<S: ByteStream> PuffinStream<S> {
    /// A stream for reading the puff view of `stream`.
    pub fn new_for_puff(
        stream: S,
        puffer: Rc<RefCell<Puffer>>,
        puff_size: u64,
        deflates: Vec<BitExtent>,
        puffs: Vec<ByteExtent>,
    ) -> Result<Self> {
        Self::new(stream, Some(puffer), None, puff_size, deflates, puffs)
    }

    /// A stream for writing the puff view, huffing into `stream`.
    pub fn new_for_huff(
        stream: S,
        huffer: Rc<RefCell<Huffer>>,
        puff_size: u64,
        deflates: Vec<BitExtent>,
        puffs: Vec<ByteExtent>,
    ) -> Result<Self> {
        Self::new(stream, None, Some(huffer), puff_size, deflates, puffs)
    }

    fn new(
        stream: S,
        puffer: Option<Rc<RefCell<Puffer>>>,
        huffer: Option<Rc<RefCell<Huffer>>>,
        puff_stream_size: u64,
        deflates: Vec<BitExtent>,
        puffs: Vec<ByteExtent>,
    ) -> Result<Self> {
        if deflates.len() != puffs.len() {
            return Err(Error::invalid("deflate and puff extent counts differ"));
        }

        let mut shared_head = vec![false; deflates.len()];
        let mut extra_byte = vec![false; deflates.len()];
        for i in 0..deflates.len() {
            let d = deflates[i];
            if d.length == 0 || puffs[i].length == 0 {
                return Err(Error::invalid("empty extent"));
            }
            if puffs[i].end() > puff_stream_size {
                return Err(Error::invalid("puff extent past end of puff stream"));
            }
            if i > 0 {
                let prev_end = deflates[i - 1].end();
                if d.offset < prev_end || puffs[i].offset < puffs[i - 1].end() {
                    return Err(Error::invalid("extents out of order"));
                }
                // A byte shared with the previous deflate must be shared by
                // exact bit contiguity; gap bits inside one byte have no
                // representation in the puff stream.
                if d.first_byte() * 8 < prev_end && d.offset != prev_end {
                    return Err(Error::invalid("bit gap inside a shared byte"));
                }
                shared_head[i] = d.offset % 8 != 0 && d.offset == prev_end;
            }
            let next_contiguous =
                i + 1 < deflates.len() && deflates[i + 1].offset == d.end() && d.end() % 8 != 0;
            extra_byte[i] = d.end() % 8 != 0 && !next_contiguous;
        }

        let max_puff = puffs.iter().map(|p| p.length).max().unwrap_or(0) as usize;
        let max_deflate = deflates
            .iter()
            .map(|d| d.past_last_byte() - d.first_byte())
            .max()
            .unwrap_or(0) as usize;

        let mut this = Self {
            stream,
            puffer,
            huffer,
            puff_stream_size,
            deflates,
            puffs,
            shared_head,
            extra_byte,
            pos: 0,
            cached_extent: None,
            cur: 0,
            skip_bytes: 0,
            last_byte: 0,
            closed: false,
            puff_buffer: vec![0; max_puff + 1],
            deflate_buffer: vec![0; max_deflate + 1],
        };
        this.stream.seek(0)?;
        Ok(this)
    }

    /// Hand the backing stream back, e.g. to inspect a written buffer.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// First extent whose end lies past `pos` (== len when past all puffs).
    fn find_extent(&self, pos: u64) -> usize {
        self.puffs.partition_point(|p| p.end() <= pos)
    }

    /// Source byte backing puff position `pos`, which lies in the raw region
    /// before extent `next` (or after the last extent when `next == len`).
    fn raw_source_byte(&self, next: usize, pos: u64) -> u64 {
        if next == 0 {
            pos
        } else {
            // Raw data resumes at the byte holding the previous deflate's
            // last bit (shared with raw) or just after it (aligned tail).
            let src_start = self.deflates[next - 1].end() / 8;
            let puff_start = self.puffs[next - 1].end();
            src_start + (pos - puff_start)
        }
    }

    /// Puff extent `index` into `out`, which must be exactly the extent size.
    fn materialize_into(&mut self, index: usize, out: &mut [u8]) -> Result<()> {
        let deflate = self.deflates[index];
        let first = deflate.first_byte();
        let nbytes = (deflate.past_last_byte() - first) as usize;
        self.stream.seek(first)?;
        self.stream.read(&mut self.deflate_buffer[..nbytes])?;

        let head_bits = (deflate.offset % 8) as u32;
        let mut br = BitReader::with_bit_length(
            &self.deflate_buffer[..nbytes],
            u64::from(head_bits) + deflate.length,
        );
        br.cache_bits(head_bits)?;
        br.drop_bits(head_bits);

        let out_len = out.len();
        let mut pw = PuffWriter::new(out);
        let puffer = self
            .puffer
            .as_ref()
            .ok_or_else(|| Error::invalid("puffin stream not opened for reading"))?;
        puffer.borrow_mut().puff_deflate(&mut br, &mut pw)?;
        pw.flush()?;
        if pw.size() != out_len || br.bits_remaining() != 0 {
            return Err(Error::invalid(format!(
                "puff size mismatch for extent {index}: got {}, expected {}",
                pw.size(),
                out_len
            )));
        }
        Ok(())
    }

    fn materialize_cached(&mut self, index: usize) -> Result<()> {
        if self.cached_extent == Some(index) {
            return Ok(());
        }
        let length = self.puffs[index].length as usize;
        let mut scratch = std::mem::take(&mut self.puff_buffer);
        let result = self.materialize_into(index, &mut scratch[..length]);
        self.puff_buffer = scratch;
        result?;
        self.cached_extent = Some(index);
        Ok(())
    }

    /// Huff the filled extent `self.cur` into the backing stream.
    fn huff_current(&mut self) -> Result<()> {
        let index = self.cur;
        let deflate = self.deflates[index];
        let puff_len = self.puffs[index].length as usize;
        let head_bits = (deflate.offset % 8) as u32;
        let total_bits = u64::from(head_bits) + deflate.length;
        let out_bytes = ((total_bits + 7) / 8) as usize;
        debug!("huffing extent {index}: {total_bits} bits into {out_bytes} bytes");

        let mut scratch = std::mem::take(&mut self.deflate_buffer);
        let result = (|| -> Result<(usize, u8)> {
            let mut bw = BitWriter::new(&mut scratch[..out_bytes]);
            if head_bits > 0 {
                bw.write_bits(head_bits, u32::from(self.last_byte))?;
            }
            let mut pr = PuffReader::new(&self.puff_buffer[..puff_len]);
            let huffer = self
                .huffer
                .as_ref()
                .ok_or_else(|| Error::invalid("puffin stream not opened for writing"))?;
            huffer.borrow_mut().huff_deflate(&mut pr, &mut bw)?;
            if bw.bits_written() != total_bits {
                return Err(Error::invalid(format!(
                    "huffed bit count mismatch for extent {index}: got {}, expected {total_bits}",
                    bw.bits_written()
                )));
            }
            Ok((bw.size(), bw.pending_byte()))
        })();
        let (full_bytes, pending) = match result {
            Ok(v) => v,
            Err(e) => {
                self.deflate_buffer = scratch;
                return Err(e);
            }
        };

        let rem = (total_bits % 8) as u32;
        // A head taken from an already-written raw byte is not re-emitted.
        let emit_from = usize::from(head_bits > 0 && !self.shared_head[index]);
        if emit_from > full_bytes {
            self.deflate_buffer = scratch;
            return Err(Error::invalid(format!(
                "deflate extent {index} too short to span a byte"
            )));
        }
        let write_result = if rem == 0 {
            self.stream.write(&scratch[emit_from..full_bytes])
        } else if self.extra_byte[index] {
            // Finish the tail byte with the high bits of the raw byte that
            // follows the puff in the puff stream.
            let raw = self.puff_buffer[puff_len];
            let mask = (1u8 << rem) - 1;
            scratch[full_bytes] = (pending & mask) | (raw & !mask);
            self.stream.write(&scratch[emit_from..full_bytes + 1])
        } else {
            // The next deflate continues inside this byte.
            self.last_byte = pending;
            self.stream.write(&scratch[emit_from..full_bytes])
        };
        self.deflate_buffer = scratch;
        write_result
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::invalid("puffin stream is closed"));
        }
        Ok(())
    }
}

impl<S: ByteStream> ByteStream for PuffinStream<S> {
    fn size(&self) -> Result<u64> {
        Ok(self.puff_stream_size)
    }

    fn offset(&self) -> Result<u64> {
        Ok(self.pos)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.check_open()?;
        if self.puffer.is_none() {
            // Huffing is append-only; accept only a rewind to zero or a
            // seek to the current position.
            if offset != 0 && offset != self.pos {
                return Err(Error::invalid("huff-side stream only seeks to zero"));
            }
            if offset == 0 {
                self.cur = 0;
                self.skip_bytes = 0;
                self.last_byte = 0;
                self.stream.seek(0)?;
            }
            self.pos = offset;
            return Ok(());
        }
        if offset > self.puff_stream_size {
            return Err(Error::invalid("seek past end of puff stream"));
        }
        self.pos = offset;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_open()?;
        if self.puffer.is_none() {
            return Err(Error::invalid("puffin stream not opened for reading"));
        }
        if self.pos + buf.len() as u64 > self.puff_stream_size {
            return Err(Error::invalid("read past end of puff stream"));
        }

        let mut done = 0usize;
        while done < buf.len() {
            let index = self.find_extent(self.pos);
            let next_start = self
                .puffs
                .get(index)
                .map_or(self.puff_stream_size, |p| p.offset);
            if self.pos < next_start {
                // Raw passthrough between puffs.
                let take = ((next_start - self.pos) as usize).min(buf.len() - done);
                let src = self.raw_source_byte(index, self.pos);
                self.stream.seek(src)?;
                self.stream.read(&mut buf[done..done + take])?;
                self.pos += take as u64;
                done += take;
            } else {
                let puff = self.puffs[index];
                let within = self.pos - puff.offset;
                let remaining = buf.len() - done;
                if within == 0 && remaining as u64 >= puff.length {
                    // Whole aligned extent: puff straight into the caller.
                    let length = puff.length as usize;
                    self.materialize_into(index, &mut buf[done..done + length])?;
                    self.pos += puff.length;
                    done += length;
                } else {
                    self.materialize_cached(index)?;
                    let take = ((puff.length - within) as usize).min(remaining);
                    let start = within as usize;
                    buf[done..done + take]
                        .copy_from_slice(&self.puff_buffer[start..start + take]);
                    self.pos += take as u64;
                    done += take;
                }
            }
        }
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.check_open()?;
        if self.huffer.is_none() {
            return Err(Error::invalid("puffin stream not opened for writing"));
        }
        if self.pos + buf.len() as u64 > self.puff_stream_size {
            return Err(Error::invalid("write past end of puff stream"));
        }

        let mut done = 0usize;
        while done < buf.len() {
            if self.cur == self.puffs.len() {
                // Raw tail after the last puff.
                self.stream.write(&buf[done..])?;
                self.pos += (buf.len() - done) as u64;
                done = buf.len();
                continue;
            }
            let puff = self.puffs[self.cur];
            if self.pos < puff.offset {
                // Raw region before the current extent.
                let take = ((puff.offset - self.pos) as usize).min(buf.len() - done);
                self.stream.write(&buf[done..done + take])?;
                // Remember the byte a mid-byte deflate head may share.
                self.last_byte = buf[done + take - 1];
                self.pos += take as u64;
                done += take;
            } else {
                // Accumulate into the extent's puff buffer; an extent whose
                // tail byte is shared with raw data absorbs one extra byte.
                let target = puff.length + u64::from(self.extra_byte[self.cur]);
                let take = ((target - self.skip_bytes) as usize).min(buf.len() - done);
                let start = self.skip_bytes as usize;
                self.puff_buffer[start..start + take].copy_from_slice(&buf[done..done + take]);
                self.skip_bytes += take as u64;
                self.pos += take as u64;
                done += take;
                if self.skip_bytes == target {
                    self.huff_current()?;
                    self.cur += 1;
                    self.skip_bytes = 0;
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.stream.close()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

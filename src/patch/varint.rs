// Variable-length integer encoding for the patch header.
//
// Base-128, big-endian: most-significant group first, bit 7 set on every
// byte except the last.

use std::io::{self, Write};

use crate::error::{Error, Result};

/// Maximum encoded length for a 64-bit value (ceil(64/7) = 10).
const MAX_VARINT_LEN: usize = 10;

/// Overflow guard: if these bits are set before a shift, the next `<< 7`
/// would overflow the 64-bit accumulator.
const U64_OVERFLOW_MASK: u64 = 0xFE00_0000_0000_0000;

/// Encode `num` into `buf`, filling from the end. Returns the number of
/// bytes used (1..=10); the encoding occupies the tail of `buf`.
#[inline]
pub fn encode_u64(mut num: u64, buf: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut i = MAX_VARINT_LEN;
    loop {
        i -= 1;
        buf[i] = (num as u8 & 0x7F) | 0x80;
        num >>= 7;
        if num == 0 {
            break;
        }
    }
    buf[MAX_VARINT_LEN - 1] &= 0x7F; // clear the continuation bit on the last byte
    MAX_VARINT_LEN - i
}

/// Encode `num` and append it to a `Write` sink.
pub fn write_u64<W: Write>(w: &mut W, num: u64) -> io::Result<()> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let len = encode_u64(num, &mut buf);
    w.write_all(&buf[MAX_VARINT_LEN - len..])
}

/// Decode a varint from the head of `data`. Returns `(value, bytes used)`.
pub fn read_u64(data: &[u8]) -> Result<(u64, usize)> {
    let mut val: u64 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if val & U64_OVERFLOW_MASK != 0 {
            return Err(Error::invalid("varint overflow"));
        }
        val = (val << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((val, i + 1));
        }
    }
    Err(Error::InsufficientInput)
}

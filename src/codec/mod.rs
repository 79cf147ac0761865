// The deflate <-> puff codec.
//
// A puff stream is a byte-aligned, losslessly invertible rendering of a
// DEFLATE bit stream: block headers become opaque metadata records, Huffman
// symbols become literal runs and back-references, and the boundary bits at
// block edges are captured so the inverse transform is bit-exact.
//
// # Modules
//
// - `bitio`   — LSB-first bit reader/writer over byte slices
// - `deflate` — RFC 1951 block types and length/distance tables
// - `huffman` — canonical Huffman tables, fixed and dynamic
// - `puffio`  — typed puff records and their byte encoding
// - `puffer`  — DEFLATE bits -> puff records
// - `huffer`  — puff records -> DEFLATE bits

pub mod bitio;
pub mod deflate;
pub mod huffer;
pub mod huffman;
pub mod puffer;
pub mod puffio;

// Re-export key types for convenience.
pub use bitio::{BitReader, BitWriter};
pub use huffer::Huffer;
pub use huffman::HuffmanTable;
pub use puffer::Puffer;
pub use puffio::{MAX_BLOCK_METADATA, MAX_LITERALS_LENGTH, PuffData, PuffReader, PuffWriter};

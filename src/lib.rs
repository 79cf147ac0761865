//! Puffin: a bit-exact, reversible transform between DEFLATE streams and a
//! byte-aligned "puff" representation, plus a puff-aware binary patch
//! pipeline.
//!
//! The crate provides:
//! - The deflate <-> puff codec (`codec`): `Puffer`, `Huffer`, and the bit
//!   and record I/O underneath them
//! - Stream backings and the on-demand puff view (`stream`): `PuffinStream`
//! - The patch pipeline (`patch`): `puff_diff`, `puff_patch`, the `PUF1`
//!   envelope, and the bsdiff-class engine seam
//! - Deflate discovery helpers (`locate`)
//! - File-oriented drivers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use puffin::codec::{Huffer, Puffer};
//!
//! let deflate: &[u8] = &[0x4B, 0x04, 0x00]; // fixed block holding "a"
//! let puffed = Puffer::new().puff_to_vec(deflate)?;
//!
//! let mut rebuilt = vec![0u8; deflate.len()];
//! let size = Huffer::new().huff_buffer(&puffed, &mut rebuilt)?;
//! assert_eq!(&rebuilt[..size], deflate);
//! # Ok::<(), puffin::Error>(())
//! ```

pub mod codec;
pub mod error;
pub mod extent;
pub mod io;
pub mod locate;
pub mod patch;
pub mod stream;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{Error, Result};
pub use extent::{BitExtent, ByteExtent};

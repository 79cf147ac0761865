// The puffin patch pipeline.
//
// A puffin patch is an envelope around an opaque bsdiff-class patch of the
// two puff streams, plus the extent bookkeeping needed to rebuild the puff
// views on the apply side.
//
// # Modules
//
// - `varint` — base-128 big-endian integers for the header
// - `header` — the `PUF1` envelope and `PatchHeader` codec
// - `diff`   — PuffDiff driver and the `DeltaEngine` seam
// - `apply`  — PuffPatch driver

pub mod apply;
pub mod diff;
pub mod header;
pub mod varint;

pub use apply::{PatchConfig, puff_patch, puff_patch_with_engine};
pub use diff::{BsdiffEngine, DeltaEngine, puff_diff, puff_diff_with_engine};
pub use header::{PATCH_MAGIC, PATCH_VERSION, PatchHeader, StreamInfo, parse_patch, write_patch};

// File-level drivers for the patch pipeline.
//
// Provides `puff_diff_file()` and `puff_patch_file()` convenience functions
// around the stream-based drivers, with summary statistics. Optionally
// computes SHA-256 checksums (feature-gated behind `file-io`).

use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;

use crate::error::Result;
use crate::extent::BitExtent;
use crate::patch::apply::{PatchConfig, puff_patch_with_engine};
use crate::patch::diff::{DeltaEngine, puff_diff_with_engine};
use crate::stream::{FileStream, MemoryStream};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `puff_diff_file()`.
#[derive(Debug, Clone)]
pub struct DiffStats {
    /// Source file size in bytes.
    pub src_size: u64,
    /// Destination file size in bytes.
    pub dst_size: u64,
    /// Patch output size in bytes.
    pub patch_size: u64,
    /// Number of deflate extents on the source side.
    pub src_deflates: usize,
    /// Number of deflate extents on the destination side.
    pub dst_deflates: usize,
    /// SHA-256 of the source file (if the `file-io` feature is enabled).
    pub src_sha256: Option<[u8; 32]>,
    /// SHA-256 of the destination file (if the `file-io` feature is enabled).
    pub dst_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `puff_patch_file()`.
#[derive(Debug, Clone)]
pub struct PatchStats {
    /// Source file size in bytes.
    pub src_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// SHA-256 of the reconstructed output (if `file-io` is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    let mut hasher = sha2::Sha256::new();
    hasher.update(data);
    Some(hasher.finalize().into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

// ---------------------------------------------------------------------------
// puff_diff_file
// ---------------------------------------------------------------------------

/// Diff two deflate-bearing files into a puffin patch at `patch_path`.
///
/// Both inputs are read fully into memory; the deflate extent lists locate
/// the deflate bits inside each file (see [`crate::locate`]).
pub fn puff_diff_file<E: DeltaEngine + ?Sized>(
    src_path: &Path,
    dst_path: &Path,
    patch_path: &Path,
    src_deflates: Vec<BitExtent>,
    dst_deflates: Vec<BitExtent>,
    engine: &E,
) -> Result<DiffStats> {
    let src = std::fs::read(src_path)?;
    let dst = std::fs::read(dst_path)?;
    let stats = DiffStats {
        src_size: src.len() as u64,
        dst_size: dst.len() as u64,
        patch_size: 0,
        src_deflates: src_deflates.len(),
        dst_deflates: dst_deflates.len(),
        src_sha256: sha256(&src),
        dst_sha256: sha256(&dst),
    };

    let patch = puff_diff_with_engine(
        MemoryStream::for_read(src),
        MemoryStream::for_read(dst),
        src_deflates,
        dst_deflates,
        engine,
    )?;
    std::fs::write(patch_path, &patch)?;
    Ok(DiffStats {
        patch_size: patch.len() as u64,
        ..stats
    })
}

// ---------------------------------------------------------------------------
// puff_patch_file
// ---------------------------------------------------------------------------

/// Apply a puffin patch file to `src_path`, writing `output_path`.
pub fn puff_patch_file<E: DeltaEngine + ?Sized>(
    src_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    engine: &E,
    config: &PatchConfig,
) -> Result<PatchStats> {
    let src = std::fs::read(src_path)?;
    let patch = std::fs::read(patch_path)?;
    let src_size = src.len() as u64;
    let patch_size = patch.len() as u64;

    let output = FileStream::open(output_path, false, true)?;
    puff_patch_with_engine(MemoryStream::for_read(src), output, &patch, engine, config)?;

    let written = std::fs::read(output_path)?;
    Ok(PatchStats {
        src_size,
        patch_size,
        output_size: written.len() as u64,
        output_sha256: sha256(&written),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::diff::BsdiffEngine;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_temp_file(name: &str, data: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join("puffin_io_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    fn cleanup_temp_files(paths: &[&Path]) {
        for p in paths {
            let _ = std::fs::remove_file(p);
        }
    }

    #[test]
    fn diff_patch_file_roundtrip() {
        // Plain payloads with no deflate extents still patch correctly.
        let src_data = b"alpha beta gamma delta epsilon zeta".as_slice();
        let dst_data = b"alpha beta GAMMA delta epsilon zeta eta".as_slice();

        let src_path = write_temp_file("src.bin", src_data);
        let dst_path = write_temp_file("dst.bin", dst_data);
        let patch_path = write_temp_file("patch.puf", b"");
        let out_path = write_temp_file("out.bin", b"");

        let diff_stats = puff_diff_file(
            &src_path,
            &dst_path,
            &patch_path,
            vec![],
            vec![],
            &BsdiffEngine,
        )
        .unwrap();
        assert_eq!(diff_stats.src_size, src_data.len() as u64);
        assert_eq!(diff_stats.dst_size, dst_data.len() as u64);
        assert!(diff_stats.patch_size > 0);

        let patch_stats = puff_patch_file(
            &src_path,
            &patch_path,
            &out_path,
            &BsdiffEngine,
            &PatchConfig::default(),
        )
        .unwrap();
        assert_eq!(patch_stats.output_size, dst_data.len() as u64);
        assert_eq!(std::fs::read(&out_path).unwrap(), dst_data);

        #[cfg(feature = "file-io")]
        {
            assert!(diff_stats.dst_sha256.is_some());
            assert_eq!(patch_stats.output_sha256, diff_stats.dst_sha256);
        }

        cleanup_temp_files(&[&src_path, &dst_path, &patch_path, &out_path]);
    }
}

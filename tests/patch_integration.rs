// End-to-end puffdiff / puffpatch over real compressed artifacts.

use std::io::Write;
use std::rc::Rc;

use flate2::Compression;
use flate2::write::{DeflateEncoder, ZlibEncoder};
use puffin::extent::ByteExtent;
use puffin::locate::{find_deflate_subblocks, locate_deflates_in_zlib_blocks};
use puffin::patch::{BsdiffEngine, DeltaEngine, parse_patch, puff_diff, puff_patch};
use puffin::stream::{MemoryStream, shared_buffer};

fn deflate(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn zlib(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Diff `src` against `dst` with the given per-file deflate byte regions,
/// apply the patch, and check the reconstruction is byte-exact.
fn diff_and_patch(src: &[u8], dst: &[u8], src_regions: &[ByteExtent], dst_regions: &[ByteExtent]) -> Vec<u8> {
    let mut src_stream = MemoryStream::for_read(src.to_vec());
    let src_deflates = find_deflate_subblocks(&mut src_stream, src_regions).unwrap();
    let mut dst_stream = MemoryStream::for_read(dst.to_vec());
    let dst_deflates = find_deflate_subblocks(&mut dst_stream, dst_regions).unwrap();

    let patch = puff_diff(
        MemoryStream::for_read(src.to_vec()),
        MemoryStream::for_read(dst.to_vec()),
        src_deflates,
        dst_deflates,
    )
    .unwrap();

    let out = shared_buffer(Vec::new());
    puff_patch(
        MemoryStream::for_read(src.to_vec()),
        MemoryStream::new(Rc::clone(&out), false, true),
        &patch,
    )
    .unwrap();
    let rebuilt = out.borrow().clone();
    assert_eq!(rebuilt, dst, "puff_patch did not reproduce the destination");
    patch
}

#[test]
fn patch_between_recompressed_artifacts() {
    // The same evolving payload compressed at different levels: the
    // compressed bytes differ wildly, yet the patch still applies exactly.
    let old_payload = b"name=alpha\nvalue=1\nflag=on\n".repeat(300);
    let mut new_payload = old_payload.clone();
    new_payload.extend_from_slice(b"name=omega\nvalue=2\nflag=off\n");

    let src = deflate(&old_payload, 9);
    let dst = deflate(&new_payload, 1);
    diff_and_patch(
        &src,
        &dst,
        &[ByteExtent::new(0, src.len() as u64)],
        &[ByteExtent::new(0, dst.len() as u64)],
    );
}

#[test]
fn small_edit_yields_a_small_patch() {
    // A small payload edit under the same encoder: the puff views are
    // nearly identical, so the patch beats the compressed target easily.
    let mut old_payload = Vec::new();
    for i in 0..3000u32 {
        old_payload
            .extend_from_slice(format!("record {:05}: status ok, checksum {:08x}\n", i, i.wrapping_mul(2654435761)).as_bytes());
    }
    let mut new_payload = old_payload.clone();
    let mid = new_payload.len() / 2;
    new_payload[mid..mid + 9].copy_from_slice(b"REPLACED!");

    let src = deflate(&old_payload, 6);
    let dst = deflate(&new_payload, 6);
    let patch = diff_and_patch(
        &src,
        &dst,
        &[ByteExtent::new(0, src.len() as u64)],
        &[ByteExtent::new(0, dst.len() as u64)],
    );
    assert!(
        patch.len() < dst.len() / 2,
        "patch ({}) should be much smaller than the target ({})",
        patch.len(),
        dst.len()
    );
}

#[test]
fn patch_is_deterministic() {
    let src = deflate(&b"deterministic input A ".repeat(128), 6);
    let dst = deflate(&b"deterministic input B!".repeat(130), 6);
    let regions_src = [ByteExtent::new(0, src.len() as u64)];
    let regions_dst = [ByteExtent::new(0, dst.len() as u64)];
    let first = diff_and_patch(&src, &dst, &regions_src, &regions_dst);
    let second = diff_and_patch(&src, &dst, &regions_src, &regions_dst);
    assert_eq!(first, second);
}

#[test]
fn patch_zlib_containers() {
    // Two zlib streams embedded in a container with raw framing around them.
    let payload_a = b"{\"records\": [1, 2, 3], \"mode\": \"full\"}".repeat(60);
    let payload_b = b"{\"records\": [1, 2, 3, 4], \"mode\": \"diff\"}".repeat(60);

    let build = |payload: &[u8], level: u32| -> (Vec<u8>, Vec<ByteExtent>) {
        let z = zlib(payload, level);
        let mut host = b"HDR!".to_vec();
        host.extend_from_slice(&z);
        host.extend_from_slice(b"TRAILER");
        (host, vec![ByteExtent::new(4, z.len() as u64)])
    };
    let (src, src_zlibs) = build(&payload_a, 9);
    let (dst, dst_zlibs) = build(&payload_b, 2);

    let mut src_stream = MemoryStream::for_read(src.clone());
    let src_deflates = locate_deflates_in_zlib_blocks(&mut src_stream, &src_zlibs).unwrap();
    assert!(!src_deflates.is_empty());
    let mut dst_stream = MemoryStream::for_read(dst.clone());
    let dst_deflates = locate_deflates_in_zlib_blocks(&mut dst_stream, &dst_zlibs).unwrap();

    let patch = puff_diff(
        MemoryStream::for_read(src.clone()),
        MemoryStream::for_read(dst.clone()),
        src_deflates,
        dst_deflates,
    )
    .unwrap();

    let out = shared_buffer(Vec::new());
    puff_patch(
        MemoryStream::for_read(src),
        MemoryStream::new(Rc::clone(&out), false, true),
        &patch,
    )
    .unwrap();
    assert_eq!(&out.borrow()[..], &dst[..]);
}

#[test]
fn patch_to_empty_and_to_plain_destinations() {
    let src = deflate(&b"source material ".repeat(64), 6);
    let regions = [ByteExtent::new(0, src.len() as u64)];

    diff_and_patch(&src, b"", &regions, &[]);
    diff_and_patch(&src, &[11, 22, 33, 44], &regions, &[]);
}

#[test]
fn envelope_carries_both_stream_descriptions() {
    let src = deflate(&b"envelope source ".repeat(50), 6);
    let dst = deflate(&b"envelope destination ".repeat(50), 6);
    let mut src_stream = MemoryStream::for_read(src.clone());
    let src_deflates =
        find_deflate_subblocks(&mut src_stream, &[ByteExtent::new(0, src.len() as u64)]).unwrap();
    let mut dst_stream = MemoryStream::for_read(dst.clone());
    let dst_deflates =
        find_deflate_subblocks(&mut dst_stream, &[ByteExtent::new(0, dst.len() as u64)]).unwrap();

    let patch = puff_diff(
        MemoryStream::for_read(src),
        MemoryStream::for_read(dst),
        src_deflates.clone(),
        dst_deflates.clone(),
    )
    .unwrap();

    let (header, inner) = parse_patch(&patch).unwrap();
    assert_eq!(header.src.deflates, src_deflates);
    assert_eq!(header.dst.deflates, dst_deflates);
    assert_eq!(header.src.deflates.len(), header.src.puffs.len());
    assert_eq!(header.dst.deflates.len(), header.dst.puffs.len());
    assert!(header.src.puff_length > 0);
    assert!(!inner.is_empty());
}

#[test]
fn corrupt_patches_are_rejected() {
    let src = deflate(b"victim", 6);
    let out = shared_buffer(Vec::new());

    // Not a patch at all.
    assert!(
        puff_patch(
            MemoryStream::for_read(src.clone()),
            MemoryStream::new(Rc::clone(&out), false, true),
            b"PUFFIN? no",
        )
        .is_err()
    );

    // Valid envelope, garbage inner patch.
    let engine = BsdiffEngine;
    let real = engine.diff(b"aaaa", b"aaab").unwrap();
    let mut patched = real.clone();
    patched[0] ^= 0xFF;
    let mut sink = Vec::new();
    assert!(engine.apply(b"aaaa", &patched, &mut sink).is_err());
}

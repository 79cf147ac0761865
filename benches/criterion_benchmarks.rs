use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use puffin::codec::{Huffer, Puffer};
use puffin::extent::ByteExtent;
use puffin::locate::find_deflate_subblocks;
use puffin::patch::{puff_diff, puff_patch};
use puffin::stream::{MemoryStream, shared_buffer};

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for i in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        // Mix structure with noise so deflate emits all block flavors.
        if i % 4 == 0 {
            out.push((s >> 33) as u8);
        } else {
            out.push(b'a' + ((s >> 45) % 16) as u8);
        }
    }
    out
}

fn deflate(data: &[u8], level: u32) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn bench_puff(c: &mut Criterion) {
    let mut group = c.benchmark_group("puff");
    for size in [64 * 1024, 1024 * 1024] {
        let comp = deflate(&gen_data(size, 42), 6);
        group.throughput(Throughput::Bytes(comp.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &comp, |b, comp| {
            let mut puffer = Puffer::new();
            b.iter(|| black_box(puffer.puff_to_vec(black_box(comp)).unwrap()));
        });
    }
    group.finish();
}

fn bench_huff(c: &mut Criterion) {
    let mut group = c.benchmark_group("huff");
    for size in [64 * 1024, 1024 * 1024] {
        let comp = deflate(&gen_data(size, 42), 6);
        let puffed = Puffer::new().puff_to_vec(&comp).unwrap();
        group.throughput(Throughput::Bytes(puffed.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(puffed, comp.len()),
            |b, (puffed, comp_len)| {
                let mut huffer = Huffer::new();
                let mut out = vec![0u8; *comp_len];
                b.iter(|| {
                    let n = huffer.huff_buffer(black_box(puffed), &mut out).unwrap();
                    black_box(n)
                });
            },
        );
    }
    group.finish();
}

fn bench_diff_and_patch(c: &mut Criterion) {
    let payload = gen_data(512 * 1024, 7);
    let mut changed = payload.clone();
    for i in (0..changed.len()).step_by(4096) {
        changed[i] = changed[i].wrapping_add(1);
    }
    let src = deflate(&payload, 6);
    let dst = deflate(&changed, 6);

    let extents = |comp: &[u8]| {
        let mut stream = MemoryStream::for_read(comp.to_vec());
        find_deflate_subblocks(&mut stream, &[ByteExtent::new(0, comp.len() as u64)]).unwrap()
    };
    let src_deflates = extents(&src);
    let dst_deflates = extents(&dst);

    c.bench_function("puff_diff 512k", |b| {
        b.iter(|| {
            puff_diff(
                MemoryStream::for_read(src.clone()),
                MemoryStream::for_read(dst.clone()),
                src_deflates.clone(),
                dst_deflates.clone(),
            )
            .unwrap()
        });
    });

    let patch = puff_diff(
        MemoryStream::for_read(src.clone()),
        MemoryStream::for_read(dst.clone()),
        src_deflates,
        dst_deflates,
    )
    .unwrap();
    c.bench_function("puff_patch 512k", |b| {
        b.iter(|| {
            let out = shared_buffer(Vec::new());
            puff_patch(
                MemoryStream::for_read(src.clone()),
                MemoryStream::new(out, false, true),
                &patch,
            )
            .unwrap()
        });
    });
}

criterion_group!(benches, bench_puff, bench_huff, bench_diff_and_patch);
criterion_main!(benches);

// Command-line driver for the puffin operations.
//
// Four subcommands mirror the four library drivers: `puff` and `huff` run
// the raw transforms through a PuffinStream, `puffdiff` and `puffpatch`
// run the patch pipeline. Extent lists are given as
// `offset:length,offset:length,...` (bits for deflates, bytes for puffs).

use std::cell::RefCell;
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

use clap::{Args, Parser, Subcommand};
use log::info;

use crate::codec::huffer::Huffer;
use crate::codec::puffer::Puffer;
use crate::error::{Error, Result};
use crate::extent::{BitExtent, ByteExtent};
use crate::locate::find_puff_locations;
use crate::patch::apply::PatchConfig;
use crate::patch::diff::BsdiffEngine;
use crate::stream::{ByteStream, FileStream, PuffinStream};

const COPY_BUF_SIZE: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Argument parsing helpers
// ---------------------------------------------------------------------------

fn parse_extent_pairs(s: &str) -> std::result::Result<Vec<(u64, u64)>, String> {
    if s.is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|part| {
            let (offset, length) = part
                .split_once(':')
                .ok_or_else(|| format!("extent '{part}' is not offset:length"))?;
            let offset: u64 = offset
                .trim()
                .parse()
                .map_err(|e| format!("bad offset in '{part}': {e}"))?;
            let length: u64 = length
                .trim()
                .parse()
                .map_err(|e| format!("bad length in '{part}': {e}"))?;
            Ok((offset, length))
        })
        .collect()
}

/// Newtype wrappers so clap treats an extent list as one value, not as
/// repeated occurrences.
#[derive(Debug, Clone, Default)]
struct BitExtents(Vec<BitExtent>);

#[derive(Debug, Clone, Default)]
struct ByteExtents(Vec<ByteExtent>);

fn parse_bit_extents(s: &str) -> std::result::Result<BitExtents, String> {
    Ok(BitExtents(
        parse_extent_pairs(s)?
            .into_iter()
            .map(|(offset, length)| BitExtent::new(offset, length))
            .collect(),
    ))
}

fn parse_byte_extents(s: &str) -> std::result::Result<ByteExtents, String> {
    Ok(ByteExtents(
        parse_extent_pairs(s)?
            .into_iter()
            .map(|(offset, length)| ByteExtent::new(offset, length))
            .collect(),
    ))
}

/// Byte count with an optional binary K/M/G suffix, e.g. "64K" or "50m".
fn parse_byte_size(s: &str) -> std::result::Result<u64, String> {
    let text = s.trim();
    let (digits, shift) = match text.char_indices().last() {
        None => return Err(String::from("empty byte size")),
        Some((i, 'k' | 'K')) => (&text[..i], 10u32),
        Some((i, 'm' | 'M')) => (&text[..i], 20),
        Some((i, 'g' | 'G')) => (&text[..i], 30),
        Some(_) => (text, 0),
    };
    let value: u64 = digits
        .trim_end()
        .parse()
        .map_err(|_| format!("unparsable byte size '{text}'"))?;
    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("byte size '{text}' does not fit in 64 bits"))
}

fn extents_to_string<T: std::fmt::Display>(extents: &[T]) -> String {
    extents
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// Reversible DEFLATE <-> puff transform and puff-aware binary patching.
#[derive(Parser, Debug)]
#[command(name = "puffin", version, about, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Quiet mode (suppress informational output).
    #[arg(short = 'q', long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Expand a deflate-bearing file into its puff stream.
    Puff(PuffArgs),
    /// Reconstruct a deflate-bearing file from its puff stream.
    Huff(HuffArgs),
    /// Produce a puffin patch between two deflate-bearing files.
    Puffdiff(DiffArgs),
    /// Apply a puffin patch to a source file.
    Puffpatch(PatchArgs),
}

#[derive(Args, Debug)]
struct PuffArgs {
    /// Input file holding deflate streams.
    #[arg(long)]
    src_file: PathBuf,

    /// Output file for the puff stream.
    #[arg(long)]
    dst_file: PathBuf,

    /// Deflate locations in the input, in bits (offset:length,...).
    #[arg(long, value_parser = parse_bit_extents, default_value = "")]
    src_deflates: BitExtents,
}

#[derive(Args, Debug)]
struct HuffArgs {
    /// Input file holding a puff stream.
    #[arg(long)]
    src_file: PathBuf,

    /// Output file for the reconstructed deflate stream.
    #[arg(long)]
    dst_file: PathBuf,

    /// Deflate locations in the output, in bits (offset:length,...).
    #[arg(long, value_parser = parse_bit_extents, default_value = "")]
    dst_deflates: BitExtents,

    /// Puff locations in the input, in bytes (offset:length,...).
    #[arg(long, value_parser = parse_byte_extents, default_value = "")]
    src_puffs: ByteExtents,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Source file.
    #[arg(long)]
    src_file: PathBuf,

    /// Destination file.
    #[arg(long)]
    dst_file: PathBuf,

    /// Patch file to write.
    #[arg(long)]
    patch_file: PathBuf,

    /// Deflate locations in the source, in bits (offset:length,...).
    #[arg(long, value_parser = parse_bit_extents, default_value = "")]
    src_deflates: BitExtents,

    /// Deflate locations in the destination, in bits (offset:length,...).
    #[arg(long, value_parser = parse_bit_extents, default_value = "")]
    dst_deflates: BitExtents,
}

#[derive(Args, Debug)]
struct PatchArgs {
    /// Source file.
    #[arg(long)]
    src_file: PathBuf,

    /// Output file to reconstruct.
    #[arg(long)]
    dst_file: PathBuf,

    /// Patch file to apply.
    #[arg(long)]
    patch_file: PathBuf,

    /// Maximum in-memory copy of the source puff stream (supports K/M/G).
    #[arg(long, value_parser = parse_byte_size, default_value = "50M")]
    cache_size: u64,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

fn run_puff(args: &PuffArgs) -> Result<()> {
    let mut src = FileStream::open(&args.src_file, true, false)?;
    let (puffs, puff_size) = find_puff_locations(&mut src, &args.src_deflates.0)?;
    info!("dst_puffs: {}", extents_to_string(&puffs));

    let mut reader = PuffinStream::new_for_puff(
        src,
        Rc::new(RefCell::new(Puffer::new())),
        puff_size,
        args.src_deflates.0.clone(),
        puffs,
    )?;
    let mut dst = FileStream::open(&args.dst_file, false, true)?;

    let mut buffer = vec![0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;
    while copied < puff_size {
        let chunk = (puff_size - copied).min(buffer.len() as u64) as usize;
        reader.read(&mut buffer[..chunk])?;
        dst.write(&buffer[..chunk])?;
        copied += chunk as u64;
    }
    dst.close()?;
    info!("puffed {copied} bytes");
    Ok(())
}

fn run_huff(args: &HuffArgs) -> Result<()> {
    let mut src = FileStream::open(&args.src_file, true, false)?;
    let puff_size = src.size()?;
    let dst = FileStream::open(&args.dst_file, false, true)?;
    let mut writer = PuffinStream::new_for_huff(
        dst,
        Rc::new(RefCell::new(Huffer::new())),
        puff_size,
        args.dst_deflates.0.clone(),
        args.src_puffs.0.clone(),
    )?;

    let mut buffer = vec![0u8; COPY_BUF_SIZE];
    let mut copied = 0u64;
    while copied < puff_size {
        let chunk = (puff_size - copied).min(buffer.len() as u64) as usize;
        src.read(&mut buffer[..chunk])?;
        writer.write(&buffer[..chunk])?;
        copied += chunk as u64;
    }
    writer.close()?;
    info!("huffed {copied} puff bytes");
    Ok(())
}

fn run_diff(args: &DiffArgs) -> Result<()> {
    info!("src_deflates: {}", extents_to_string(&args.src_deflates.0));
    info!("dst_deflates: {}", extents_to_string(&args.dst_deflates.0));
    let stats = crate::io::puff_diff_file(
        &args.src_file,
        &args.dst_file,
        &args.patch_file,
        args.src_deflates.0.clone(),
        args.dst_deflates.0.clone(),
        &BsdiffEngine,
    )?;
    info!(
        "patch size: {} (src {} bytes, dst {} bytes)",
        stats.patch_size, stats.src_size, stats.dst_size
    );
    Ok(())
}

fn run_patch(args: &PatchArgs) -> Result<()> {
    let config = PatchConfig {
        cache_size: args.cache_size,
    };
    let stats = crate::io::puff_patch_file(
        &args.src_file,
        &args.patch_file,
        &args.dst_file,
        &BsdiffEngine,
        &config,
    )?;
    info!(
        "reconstructed {} bytes from {} patch bytes",
        stats.output_size, stats.patch_size
    );
    Ok(())
}

/// CLI entry point: parses arguments, runs the operation, exits.
pub fn run() -> ! {
    let cli = Cli::parse();
    let mut builder = env_logger::Builder::from_default_env();
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Error);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    let _ = builder.try_init();

    let result = match &cli.command {
        Cmd::Puff(args) => run_puff(args),
        Cmd::Huff(args) => run_huff(args),
        Cmd::Puffdiff(args) => run_diff(args),
        Cmd::Puffpatch(args) => run_patch(args),
    };
    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            log::error!("{}", describe(&e));
            process::exit(1);
        }
    }
}

fn describe(e: &Error) -> String {
    match e {
        Error::InvalidInput(_) => format!("{e} (InvalidInput)"),
        Error::InsufficientInput => format!("{e} (InsufficientInput)"),
        Error::InsufficientOutput => format!("{e} (InsufficientOutput)"),
        Error::StreamIo(_) => format!("{e} (StreamIO)"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

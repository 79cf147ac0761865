// Walk a deflate stream through the puff transform and back.
//
// Run with: cargo run --example basic_puff_huff

use std::io::Write;

use flate2::Compression;
use flate2::write::DeflateEncoder;
use puffin::codec::{Huffer, PuffData, PuffReader, Puffer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"puffin turns deflate bits into bytes, ".repeat(8);
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(&payload)?;
    let compressed = encoder.finish()?;
    println!(
        "payload {} bytes -> deflate {} bytes",
        payload.len(),
        compressed.len()
    );

    let puffed = Puffer::new().puff_to_vec(&compressed)?;
    println!("puff stream: {} bytes", puffed.len());

    let mut reader = PuffReader::new(&puffed);
    while reader.bytes_left() > 0 {
        match reader.next_record()? {
            PuffData::BlockMetadata(md) => {
                println!(
                    "  block: final={} type={} metadata={} bytes",
                    md[0] >> 7,
                    (md[0] >> 5) & 3,
                    md.len()
                );
            }
            PuffData::Literals(bytes) => println!("  literals x{}", bytes.len()),
            PuffData::LenDist { length, distance } => {
                println!("  backref length={length} distance={distance}")
            }
            PuffData::EndOfBlock { trailing_bits } => {
                println!("  end of block (trailing bits {trailing_bits:#04b})")
            }
            PuffData::Literal(byte) => println!("  literal {byte:#04x}"),
        }
    }

    let mut rebuilt = vec![0u8; compressed.len()];
    let size = Huffer::new().huff_buffer(&puffed, &mut rebuilt)?;
    assert_eq!(&rebuilt[..size], &compressed[..]);
    println!("huffed back: {} bytes, bit-identical", size);
    Ok(())
}

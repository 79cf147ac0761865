#![no_main]
use libfuzzer_sys::fuzz_target;
use puffin::codec::Huffer;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes treated as a puff stream: the huffer must fail
    // cleanly or produce something bounded, never panic.
    let mut out = vec![0u8; data.len() * 4 + 64];
    let _ = Huffer::new().huff_buffer(data, &mut out);
});

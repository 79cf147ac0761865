#![no_main]
use libfuzzer_sys::fuzz_target;
use puffin::codec::{Huffer, Puffer};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes rarely form valid deflate; errors are fine, panics
    // are not. When the input does puff, huffing must succeed, and the
    // rebuilt stream must puff to the same records again. (Byte equality
    // with the input is only guaranteed for streams that end with a final
    // block bit; otherwise the unread trailing pad bits are normalized to
    // zero, so the fixed point is the invariant to check.)
    let Ok(puffed) = Puffer::new().puff_to_vec(data) else {
        return;
    };
    let mut rebuilt = vec![0u8; data.len() + 8];
    let size = Huffer::new()
        .huff_buffer(&puffed, &mut rebuilt)
        .expect("huff of a fresh puff failed");
    let repuffed = Puffer::new()
        .puff_to_vec(&rebuilt[..size])
        .expect("rebuilt deflate stream failed to puff");
    assert_eq!(repuffed, puffed, "puff(huff(P)) != P");
});

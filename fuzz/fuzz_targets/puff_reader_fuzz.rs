#![no_main]
use libfuzzer_sys::fuzz_target;
use puffin::codec::PuffReader;

fuzz_target!(|data: &[u8]| {
    // The record parser must reject garbage without panicking.
    let mut reader = PuffReader::new(data);
    while reader.bytes_left() > 0 {
        if reader.next_record().is_err() {
            break;
        }
    }
});

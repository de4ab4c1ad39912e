#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Full pipeline over arbitrary bytes: must never panic, only error.
    let split = data.len() / 2;
    let (rom, tail) = data.split_at(split);
    let _ = oxipatch::apply(rom.to_vec(), tail.to_vec(), false);

    // Force each magic so the codecs see the tail as their own body.
    for magic in [b"PATCH".as_slice(), b"BPS1", b"UPS1"] {
        let mut patch = magic.to_vec();
        patch.extend_from_slice(tail);
        let _ = oxipatch::apply(rom.to_vec(), patch.clone(), false);
        let _ = oxipatch::apply(rom.to_vec(), patch, true);
    }
});

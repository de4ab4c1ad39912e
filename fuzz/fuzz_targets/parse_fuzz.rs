#![no_main]
use libfuzzer_sys::fuzz_target;
use oxipatch::formats::{BpsCodec, IpsCodec, PatchFormat, UpsCodec};

fuzz_target!(|data: &[u8]| {
    // Parse stage alone, against every codec regardless of header.
    let mut ips = IpsCodec::new();
    if ips.init(Vec::<u8>::new().into(), data.into()).is_ok() {
        let _ = ips.parse();
    }

    let mut bps = BpsCodec::new();
    if bps.init(Vec::<u8>::new().into(), data.into()).is_ok() {
        let _ = bps.parse();
    }

    let mut ups = UpsCodec::new();
    if ups.init(Vec::<u8>::new().into(), data.into()).is_ok() {
        let _ = ups.parse();
    }
});

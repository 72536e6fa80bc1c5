#![no_main]
use libfuzzer_sys::fuzz_target;
use mindnet_core::store;
use std::path::Path;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly, never panic.
    if let Ok(network) = store::decode(data, Path::new("fuzz")) {
        let _ = store::encode(&network);
    }
});

#![no_main]
use libfuzzer_sys::fuzz_target;
use mindnet_core::mindmap::{self, SerializeOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let report = mindmap::validate(text);
        match mindmap::parse(text) {
            Ok(tree) => {
                assert!(report.valid);
                // whatever parses must survive a serialize/parse cycle
                let again = mindmap::parse(&mindmap::serialize(&tree, &SerializeOptions::default()));
                assert!(again.is_ok());
                let _ = mindmap::merge(text, text);
            }
            Err(_) => assert!(!report.valid),
        }
    }
});

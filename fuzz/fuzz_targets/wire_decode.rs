#![no_main]

use libfuzzer_sys::fuzz_target;
use raw_image_cache::engine::{from_wire_bytes, to_wire_bytes};

fuzz_target!(|data: &[u8]| {
    if let Ok(buffer) = from_wire_bytes(data) {
        // Anything that parses must serialize back to the same bytes.
        assert_eq!(to_wire_bytes(&buffer), data);
    }
});

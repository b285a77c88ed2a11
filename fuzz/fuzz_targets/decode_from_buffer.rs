#![no_main]

use libfuzzer_sys::fuzz_target;
use raw_image_cache::engine::{DecodeLimits, ImageLoader, NativeLoader};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Small limits keep decompression bombs from exhausting the fuzzer.
    let loader = NativeLoader::new(DecodeLimits {
        max_dimension: 4096,
        max_pixels: 4_000_000,
    });
    if let Ok(raw) = loader.decode(data) {
        assert!(raw.width() <= 4096 && raw.height() <= 4096);
        assert_eq!(raw.pixels().len(), raw.pixel_count() * 4);
    }
});

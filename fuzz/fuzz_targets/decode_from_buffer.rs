#![no_main]

use brush_stylize::engine::{decode_image, inspect_dimensions, SizePolicy};
use brush_stylize::{stylize_bytes, LimitsPolicy, StylizeOptions};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Header parsing and full decode must agree or fail cleanly.
    if let (Ok(dims), Ok((img, _))) = (inspect_dimensions(data), decode_image(data)) {
        assert_eq!(dims, (img.width(), img.height()));
    }

    // Keep the working size small so each input stays fast.
    let options = StylizeOptions::new()
        .seed(0)
        .optimize_png(false)
        .limits_policy(LimitsPolicy::Strict)
        .size_policy(SizePolicy {
            large_threshold: 128,
            large_target: 64,
            medium_threshold: 64,
            medium_target: 48,
        });
    if let Ok(out) = stylize_bytes(data, &options) {
        assert_eq!(inspect_dimensions(&out.png).ok(), Some((out.width, out.height)));
    }
});

// src/engine/decoder.rs
//
// Decoder operations: header inspection, safety checks and decode via the
// image crate (PNG, JPEG, WebP).

use crate::engine::common::run_with_panic_policy;
use crate::engine::{MAX_DIMENSION, MAX_PIXELS};
use crate::error::{Result, StylizeError};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

/// Formats the build can decode.
pub const SUPPORTED_INPUT_FORMATS: &[ImageFormat] =
    &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Detect input format using magic bytes. Returns None if unknown.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

pub fn format_name(fmt: ImageFormat) -> &'static str {
    match fmt {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}

/// Check if image dimensions are within safe limits.
/// Returns an error if the image is too large (potential decompression bomb)
/// or has zero area.
pub fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(StylizeError::empty_image(width, height));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(StylizeError::dimension_exceeds_limit(
            width.max(height),
            MAX_DIMENSION,
        ));
    }
    let pixels = width as u64 * height as u64;
    if pixels > MAX_PIXELS {
        return Err(StylizeError::pixel_count_exceeds_limit(pixels, MAX_PIXELS));
    }
    Ok(())
}

/// Read dimensions from the header without decoding pixels.
pub fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StylizeError::decode_failed(format!("failed to read image header: {e}")))?;
    reader
        .into_dimensions()
        .map_err(|e| StylizeError::decode_failed(format!("failed to read dimensions: {e}")))
}

/// Inspect encoded bytes and ensure the image dimensions are safe before decoding.
///
/// Headers the reader cannot parse are left for `decode_image` to report.
pub fn ensure_dimensions_safe(bytes: &[u8]) -> Result<()> {
    match inspect_dimensions(bytes) {
        Ok((width, height)) => check_dimensions(width, height),
        Err(_) => Ok(()),
    }
}

/// Unified decode entrypoint:
/// - Detect format once (magic bytes)
/// - Reject formats outside the build's set
/// - Check header dimensions, decode, then re-check the decoded size
pub fn decode_image(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    if bytes.is_empty() {
        return Err(StylizeError::decode_failed("input is empty"));
    }
    let format = detect_format(bytes)
        .ok_or_else(|| StylizeError::unsupported_format("unrecognized signature"))?;
    if !SUPPORTED_INPUT_FORMATS.contains(&format) {
        return Err(StylizeError::unsupported_format(format_name(format)));
    }

    ensure_dimensions_safe(bytes)?;
    let img = run_with_panic_policy("decode:image", || {
        image::load_from_memory_with_format(bytes, format).map_err(|e| {
            StylizeError::decode_failed(format!("{} decode failed: {e}", format_name(format)))
        })
    })?;
    check_dimensions(img.width(), img.height())?;
    Ok((img, format))
}

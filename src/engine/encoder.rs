// src/engine/encoder.rs
//
// Encoder operations: RGBA PNG with optional lossless oxipng pass, and the
// atomic, verified write of the result to disk.

use crate::engine::common::run_with_panic_policy;
use crate::engine::decoder::inspect_dimensions;
use crate::error::{Result, StylizeError};
use image::{ImageFormat, RgbaImage};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// oxipng preset used when optimization is on (0 = fastest, 6 = smallest)
pub const PNG_OPTIMIZATION_PRESET: u8 = 2;

/// Encode `img` as an 8-bit RGBA PNG.
///
/// With `optimize`, the stream is recompressed losslessly by oxipng; the
/// alpha channel is never reduced away even when fully opaque.
pub fn encode_png(img: &RgbaImage, optimize: bool) -> Result<Vec<u8>> {
    run_with_panic_policy("encode:png", || {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .map_err(|e| StylizeError::encode_failed("png", format!("PNG encode failed: {e}")))?;
        if !optimize {
            return Ok(buf);
        }

        let mut options = oxipng::Options::from_preset(PNG_OPTIMIZATION_PRESET);
        options.strip = oxipng::StripChunks::Safe;
        // Output is always RGBA.
        options.color_type_reduction = false;
        options.bit_depth_reduction = false;
        options.palette_reduction = false;
        options.grayscale_reduction = false;

        oxipng::optimize_from_memory(&buf, &options).map_err(|e| {
            StylizeError::encode_failed("png", format!("oxipng optimization failed: {e}"))
        })
    })
}

fn output_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// Write `data` to `path` atomically and verify it before declaring success.
///
/// Bytes go to a temporary file in the target directory, are synced, re-read
/// and checked against `expected_dims`, and only then renamed over `path`.
/// On any failure the temporary file is removed and `path` is left untouched.
pub fn write_png_atomic(path: &Path, data: &[u8], expected_dims: (u32, u32)) -> Result<u64> {
    let shown = path.to_string_lossy().into_owned();
    let dir = output_dir(path);

    let mut temp_file = NamedTempFile::new_in(dir)
        .map_err(|e| StylizeError::file_write_failed(dir.to_string_lossy().into_owned(), e))?;
    temp_file
        .write_all(data)
        .map_err(|e| StylizeError::file_write_failed(shown.clone(), e))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| StylizeError::file_write_failed(shown.clone(), e))?;

    verify_written(temp_file.path(), &shown, data.len() as u64, expected_dims)?;

    temp_file.persist(path).map_err(|e| {
        StylizeError::file_write_failed(
            shown.clone(),
            std::io::Error::new(e.error.kind(), format!("failed to persist file: {}", e.error)),
        )
    })?;
    debug!(path = %shown, bytes = data.len(), "output written");
    Ok(data.len() as u64)
}

/// Re-open a written PNG and check its length and header dimensions.
pub fn verify_written(
    written: &Path,
    display: &str,
    expected_len: u64,
    expected_dims: (u32, u32),
) -> Result<()> {
    let fail =
        |reason: String| StylizeError::output_verification_failed(display.to_string(), reason);
    let bytes = std::fs::read(written).map_err(|e| fail(format!("cannot re-open: {e}")))?;
    if bytes.len() as u64 != expected_len {
        return Err(fail(format!(
            "expected {expected_len} bytes on disk, found {}",
            bytes.len()
        )));
    }
    let dims = inspect_dimensions(&bytes).map_err(|e| fail(e.to_string()))?;
    if dims != expected_dims {
        return Err(fail(format!(
            "expected {}x{}, found {}x{}",
            expected_dims.0, expected_dims.1, dims.0, dims.1
        )));
    }
    Ok(())
}

// src/engine/resample.rs
//
// Adaptive resampling: pick a bounded working resolution from the longest edge,
// scale the color buffer and its mask together, and restore the original size
// afterwards. Lanczos3 via fast_image_resize, with an image-crate fallback.

use crate::error::{Result, StylizeError};
use fast_image_resize::{self as fir, ImageBufferError, PixelType, ResizeOptions};
use image::{imageops::FilterType, GrayImage, RgbImage};
use tracing::debug;

/// Longest-edge breakpoints mapping input size to working size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizePolicy {
    /// Edges above this are reduced to `large_target`
    pub large_threshold: u32,
    pub large_target: u32,
    /// Edges above this (and not above `large_threshold`) are reduced to `medium_target`
    pub medium_threshold: u32,
    pub medium_target: u32,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            large_threshold: 2048,
            large_target: 1024,
            medium_threshold: 1024,
            medium_target: 800,
        }
    }
}

impl SizePolicy {
    /// Target longest edge for an input whose longest edge is `longest`.
    pub fn target_for(&self, longest: u32) -> u32 {
        if longest > self.large_threshold {
            self.large_target
        } else if longest > self.medium_threshold {
            self.medium_target
        } else {
            longest
        }
    }

    /// Evaluate the policy once for an image of `width` x `height`.
    pub fn plan(&self, width: u32, height: u32) -> ResamplePlan {
        let longest = width.max(height);
        let target = self.target_for(longest);
        if longest <= target {
            return ResamplePlan {
                original: (width, height),
                working: (width, height),
            };
        }
        let scale = target as f64 / longest as f64;
        let scaled = |dim: u32| ((dim as f64 * scale).round() as u32).max(1);
        ResamplePlan {
            original: (width, height),
            working: (scaled(width), scaled(height)),
        }
    }
}

/// The outcome of evaluating a [`SizePolicy`]; retained until restoration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResamplePlan {
    pub original: (u32, u32),
    pub working: (u32, u32),
}

impl ResamplePlan {
    pub fn is_identity(&self) -> bool {
        self.original == self.working
    }

    /// Working longest edge divided by original longest edge.
    pub fn scale_factor(&self) -> f64 {
        let orig = self.original.0.max(self.original.1);
        if orig == 0 {
            return 1.0;
        }
        self.working.0.max(self.working.1) as f64 / orig as f64
    }
}

/// Reduce `rgb` (and `mask`, identically) to the policy's working resolution.
pub fn down(
    rgb: RgbImage,
    mask: Option<GrayImage>,
    policy: &SizePolicy,
) -> Result<(RgbImage, Option<GrayImage>, ResamplePlan)> {
    let plan = policy.plan(rgb.width(), rgb.height());
    if plan.is_identity() {
        return Ok((rgb, mask, plan));
    }
    debug!(
        from = ?plan.original,
        to = ?plan.working,
        "reducing to working resolution"
    );
    let (w, h) = plan.working;
    let rgb = resize_rgb(&rgb, w, h)?;
    let mask = mask.map(|m| resize_mask(&m, w, h)).transpose()?;
    Ok((rgb, mask, plan))
}

/// Restore `rgb` (and `mask`) to the original size recorded in `plan`.
pub fn up(
    rgb: RgbImage,
    mask: Option<GrayImage>,
    plan: &ResamplePlan,
) -> Result<(RgbImage, Option<GrayImage>)> {
    let (w, h) = plan.original;
    let rgb = if rgb.dimensions() == (w, h) {
        rgb
    } else {
        debug!(from = ?rgb.dimensions(), to = ?(w, h), "restoring original resolution");
        resize_rgb(&rgb, w, h)?
    };
    let mask = match mask {
        Some(m) if m.dimensions() != (w, h) => Some(resize_mask(&m, w, h)?),
        other => other,
    };
    Ok((rgb, mask))
}

/// Lanczos3 resize of an RGB8 buffer.
pub fn resize_rgb(img: &RgbImage, dst_width: u32, dst_height: u32) -> Result<RgbImage> {
    let (src_width, src_height) = img.dimensions();
    let pixels = resize_raw(
        img.as_raw().clone(),
        (src_width, src_height),
        PixelType::U8x3,
        (dst_width, dst_height),
    )?;
    RgbImage::from_raw(dst_width, dst_height, pixels).ok_or_else(|| {
        StylizeError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "failed to create rgb image from resized data",
        )
    })
}

/// Lanczos3 resize of a single-channel mask.
///
/// The mask is resampled as plain luminance, never premultiplied.
pub fn resize_mask(mask: &GrayImage, dst_width: u32, dst_height: u32) -> Result<GrayImage> {
    let (src_width, src_height) = mask.dimensions();
    let pixels = resize_raw(
        mask.as_raw().clone(),
        (src_width, src_height),
        PixelType::U8,
        (dst_width, dst_height),
    )?;
    GrayImage::from_raw(dst_width, dst_height, pixels).ok_or_else(|| {
        StylizeError::resize_failed(
            (src_width, src_height),
            (dst_width, dst_height),
            "failed to create mask from resized data",
        )
    })
}

fn default_resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3))
}

fn resize_raw(
    mut src_pixels: Vec<u8>,
    src_dims: (u32, u32),
    pixel_type: PixelType,
    dst_dims: (u32, u32),
) -> Result<Vec<u8>> {
    let (src_width, src_height) = src_dims;
    let (dst_width, dst_height) = dst_dims;
    let fail = |reason: String| StylizeError::resize_failed(src_dims, dst_dims, reason);

    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return Err(fail("invalid dimensions for resize".to_string()));
    }

    let required_bytes = (src_width as usize)
        .checked_mul(src_height as usize)
        .and_then(|n| n.checked_mul(pixel_type.size()))
        .ok_or_else(|| fail("image buffer size overflow during resize".to_string()))?;
    if src_pixels.len() < required_bytes {
        return Err(fail(format!(
            "source buffer too short. expected {required_bytes} bytes, got {} bytes",
            src_pixels.len()
        )));
    }

    let primary = match fir::images::Image::from_slice_u8(
        src_width,
        src_height,
        src_pixels.as_mut_slice(),
        pixel_type,
    ) {
        Ok(src_image) => resize_with_source_image(&src_image, pixel_type, dst_dims),
        Err(ImageBufferError::InvalidBufferAlignment) => {
            let mut aligned = fir::images::Image::new(src_width, src_height, pixel_type);
            aligned
                .buffer_mut()
                .copy_from_slice(&src_pixels[..required_bytes]);
            resize_with_source_image(&aligned, pixel_type, dst_dims)
        }
        Err(other) => Err(format!("fir source image error: {other:?}")),
    };

    match primary {
        Ok(pixels) => Ok(pixels),
        Err(err) => {
            debug!(error = %err, "fast resize failed, using image crate fallback");
            resize_with_image_crate_fallback(&src_pixels, src_dims, pixel_type, dst_dims)
                .map_err(|fallback| fail(format!("{err}; image crate fallback failed: {fallback}")))
        }
    }
}

fn resize_with_source_image(
    src_image: &fir::images::Image<'_>,
    pixel_type: PixelType,
    dst_dims: (u32, u32),
) -> std::result::Result<Vec<u8>, String> {
    let mut dst_image = fir::images::Image::new(dst_dims.0, dst_dims.1, pixel_type);
    let mut resizer = fir::Resizer::new();
    resizer
        .resize(src_image, &mut dst_image, &default_resize_options())
        .map_err(|e| format!("fir resize error: {e:?}"))?;
    Ok(dst_image.into_vec())
}

fn resize_with_image_crate_fallback(
    src_pixels: &[u8],
    src_dims: (u32, u32),
    pixel_type: PixelType,
    dst_dims: (u32, u32),
) -> std::result::Result<Vec<u8>, String> {
    let filter = FilterType::Lanczos3;
    match pixel_type {
        PixelType::U8x3 => {
            let rgb = RgbImage::from_raw(src_dims.0, src_dims.1, src_pixels.to_vec())
                .ok_or_else(|| "failed to build rgb image for fallback resize".to_string())?;
            Ok(image::imageops::resize(&rgb, dst_dims.0, dst_dims.1, filter).into_raw())
        }
        PixelType::U8 => {
            let gray = GrayImage::from_raw(src_dims.0, src_dims.1, src_pixels.to_vec())
                .ok_or_else(|| "failed to build mask for fallback resize".to_string())?;
            Ok(image::imageops::resize(&gray, dst_dims.0, dst_dims.1, filter).into_raw())
        }
        _ => Err("fallback resize supports only U8/U8x3 pixel types".to_string()),
    }
}

// src/engine/blur.rs
//
// Blur-and-blend softening: separable Gaussian blur, the linear blend that
// folds a blurred copy back into the accumulating image, and the bilateral
// filter used by the light profile.

use crate::error::{Result, StylizeError};
use image::RgbImage;

const CHANNELS: usize = 3;

/// Gaussian blur with standard deviation `radius`, edges clamped.
///
/// Horizontal pass accumulates into f32; the vertical pass rounds once into u8.
pub fn gaussian_blur(src: &RgbImage, radius: f32) -> Result<RgbImage> {
    let kernel = gaussian_kernel(radius)?;
    let (width, height) = src.dimensions();
    if kernel.len() == 1 {
        return Ok(src.clone());
    }

    let mut tmp = vec![0f32; src.as_raw().len()];
    horizontal_pass(src.as_raw(), &mut tmp, width, height, &kernel);
    let mut out = vec![0u8; tmp.len()];
    vertical_pass(&tmp, &mut out, width, height, &kernel);

    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| StylizeError::internal_panic("blur output buffer size mismatch"))
}

/// One softening round: `current = (1 - weight) * current + weight * blur(current)`.
///
/// A weight of 1.0 replaces the image with its blur outright.
pub fn gaussian_blend(current: RgbImage, radius: f32, weight: f32) -> Result<RgbImage> {
    if !(0.0..=1.0).contains(&weight) {
        return Err(StylizeError::invalid_argument(
            "blend weight",
            weight.to_string(),
            "must be within [0, 1]",
        ));
    }
    let blurred = gaussian_blur(&current, radius)?;
    if weight >= 1.0 {
        return Ok(blurred);
    }
    let mut current = current;
    blend_into(&mut current, &blurred, weight);
    Ok(current)
}

/// Per-pixel linear blend in f32, rounded and clipped on store.
pub fn blend_into(current: &mut RgbImage, other: &RgbImage, weight: f32) {
    debug_assert_eq!(current.dimensions(), other.dimensions());
    let keep = 1.0 - weight;
    for (dst, &src) in current.iter_mut().zip(other.iter()) {
        let v = keep * *dst as f32 + weight * src as f32;
        *dst = v.round().clamp(0.0, 255.0) as u8;
    }
}

fn gaussian_kernel(sigma: f32) -> Result<Vec<f32>> {
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(StylizeError::invalid_argument(
            "blur radius",
            sigma.to_string(),
            "must be a finite, non-negative number",
        ));
    }
    let half = (sigma * 3.0).ceil() as i32;
    if half == 0 {
        return Ok(vec![1.0]);
    }

    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-half..=half)
        .map(|i| {
            let x = i as f32;
            (-x * x / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    Ok(weights)
}

fn horizontal_pass(src: &[u8], dst: &mut [f32], width: u32, height: u32, k: &[f32]) {
    let radius = (k.len() / 2) as i64;
    let w = width as i64;
    for y in 0..height as i64 {
        let row = (y * w) as usize;
        for x in 0..w {
            let mut acc = [0f32; CHANNELS];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i64 - radius).clamp(0, w - 1) as usize;
                let idx = (row + sx) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += kw * src[idx + c] as f32;
                }
            }
            let out = (row + x as usize) * CHANNELS;
            dst[out..out + CHANNELS].copy_from_slice(&acc);
        }
    }
}

fn vertical_pass(src: &[f32], dst: &mut [u8], width: u32, height: u32, k: &[f32]) {
    let radius = (k.len() / 2) as i64;
    let w = width as usize;
    let h = height as i64;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0f32; CHANNELS];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i64 - radius).clamp(0, h - 1) as usize;
                let idx = (sy * w + x) * CHANNELS;
                for c in 0..CHANNELS {
                    acc[c] += kw * src[idx + c];
                }
            }
            let out = (y as usize * w + x) * CHANNELS;
            for c in 0..CHANNELS {
                dst[out + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Edge-preserving bilateral filter over a circular `diameter` window.
///
/// Color distance is the sum of absolute channel differences; edges clamp.
pub fn bilateral(
    src: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> Result<RgbImage> {
    let valid = |sigma: f32| sigma.is_finite() && sigma > 0.0;
    if !valid(sigma_color) || !valid(sigma_space) {
        return Err(StylizeError::invalid_argument(
            "bilateral sigma",
            format!("color={sigma_color}, space={sigma_space}"),
            "must be positive",
        ));
    }
    let radius = (diameter / 2).max(1) as i64;
    let (width, height) = src.dimensions();
    let (w, h) = (width as i64, height as i64);

    let space_coeff = -0.5 / (sigma_space * sigma_space);
    let mut offsets = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let r2 = (dx * dx + dy * dy) as f32;
            if r2 > (radius * radius) as f32 {
                continue;
            }
            offsets.push((dx, dy, (r2 * space_coeff).exp()));
        }
    }

    let color_coeff = -0.5 / (sigma_color * sigma_color);
    let color_weight: Vec<f32> = (0..=255 * CHANNELS)
        .map(|d| {
            let d = d as f32;
            (d * d * color_coeff).exp()
        })
        .collect();

    let raw = src.as_raw();
    let mut out = vec![0u8; raw.len()];
    for y in 0..h {
        for x in 0..w {
            let center = ((y * w + x) as usize) * CHANNELS;
            let c0 = &raw[center..center + CHANNELS];
            let mut acc = [0f32; CHANNELS];
            let mut wsum = 0f32;
            for &(dx, dy, sw) in &offsets {
                let sx = (x + dx).clamp(0, w - 1);
                let sy = (y + dy).clamp(0, h - 1);
                let idx = ((sy * w + sx) as usize) * CHANNELS;
                let p = &raw[idx..idx + CHANNELS];
                let dist: usize = (0..CHANNELS)
                    .map(|c| (p[c] as i32 - c0[c] as i32).unsigned_abs() as usize)
                    .sum();
                let weight = sw * color_weight[dist];
                for c in 0..CHANNELS {
                    acc[c] += weight * p[c] as f32;
                }
                wsum += weight;
            }
            for c in 0..CHANNELS {
                out[center + c] = (acc[c] / wsum).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    RgbImage::from_raw(width, height, out)
        .ok_or_else(|| StylizeError::internal_panic("bilateral output buffer size mismatch"))
}

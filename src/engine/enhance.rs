// src/engine/enhance.rs
//
// Tonal passes. Every pass interpolates between the image and a degenerate
// version of it: out = degenerate + factor * (image - degenerate), rounded and
// clipped to [0, 255] before the next pass sees it.

use crate::ops::EnhanceKind;
use image::RgbImage;

/// Apply one enhancement pass and return the clipped result.
pub fn enhance(img: RgbImage, kind: EnhanceKind, factor: f32) -> RgbImage {
    if factor == 1.0 {
        return img;
    }
    match kind {
        EnhanceKind::Color => color(img, factor),
        EnhanceKind::Contrast => contrast(img, factor),
        EnhanceKind::Brightness => brightness(img, factor),
        EnhanceKind::Sharpness => sharpness(img, factor),
    }
}

/// ITU-R 601-2 luma in 16.16 fixed point.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

#[inline]
fn lerp(degenerate: f32, value: f32, factor: f32) -> u8 {
    (degenerate + factor * (value - degenerate))
        .round()
        .clamp(0.0, 255.0) as u8
}

fn color(mut img: RgbImage, factor: f32) -> RgbImage {
    for px in img.pixels_mut() {
        let [r, g, b] = px.0;
        let l = luma(r, g, b) as f32;
        px.0 = [
            lerp(l, r as f32, factor),
            lerp(l, g as f32, factor),
            lerp(l, b as f32, factor),
        ];
    }
    img
}

fn contrast(mut img: RgbImage, factor: f32) -> RgbImage {
    let count = img.pixels().len() as u64;
    if count == 0 {
        return img;
    }
    let sum: u64 = img
        .pixels()
        .map(|px| {
            let [r, g, b] = px.0;
            luma(r, g, b) as u64
        })
        .sum();
    let mean = (sum as f64 / count as f64 + 0.5).floor() as f32;
    for v in img.iter_mut() {
        *v = lerp(mean, *v as f32, factor);
    }
    img
}

fn brightness(mut img: RgbImage, factor: f32) -> RgbImage {
    for v in img.iter_mut() {
        *v = lerp(0.0, *v as f32, factor);
    }
    img
}

/// The degenerate image is a 3x3 smoothing of the interior,
/// kernel [1 1 1; 1 5 1; 1 1 1] / 13, with the one-pixel border left as-is.
fn sharpness(img: RgbImage, factor: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    if width < 3 || height < 3 {
        // No interior: the degenerate image equals the input.
        return img;
    }
    let smooth = smooth_interior(&img);
    let mut out = img;
    for (dst, &degenerate) in out.iter_mut().zip(smooth.iter()) {
        *dst = lerp(degenerate as f32, *dst as f32, factor);
    }
    out
}

fn smooth_interior(img: &RgbImage) -> RgbImage {
    const WEIGHTS: [[u32; 3]; 3] = [[1, 1, 1], [1, 5, 1], [1, 1, 1]];
    const TOTAL: u32 = 13;

    let (width, height) = img.dimensions();
    let mut out = img.clone();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = [0u32; 3];
            for (ky, row) in WEIGHTS.iter().enumerate() {
                for (kx, &w) in row.iter().enumerate() {
                    let p = img.get_pixel(x + kx as u32 - 1, y + ky as u32 - 1).0;
                    for c in 0..3 {
                        acc[c] += w * p[c] as u32;
                    }
                }
            }
            out.get_pixel_mut(x, y).0 = acc.map(|a| ((a + TOTAL / 2) / TOTAL).min(255) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) * 7 % 256) as u8,
            ])
        })
    }

    mod luma_tests {
        use super::*;

        #[test]
        fn test_luma_extremes() {
            assert_eq!(luma(0, 0, 0), 0);
            assert_eq!(luma(255, 255, 255), 255);
        }

        #[test]
        fn test_luma_weights_green_heaviest() {
            assert!(luma(0, 255, 0) > luma(255, 0, 0));
            assert!(luma(255, 0, 0) > luma(0, 0, 255));
        }
    }

    mod pass_tests {
        use super::*;

        #[test]
        fn test_factor_one_is_identity() {
            let img = gradient(8, 8);
            for kind in [
                EnhanceKind::Color,
                EnhanceKind::Contrast,
                EnhanceKind::Brightness,
                EnhanceKind::Sharpness,
            ] {
                assert_eq!(enhance(img.clone(), kind, 1.0), img);
            }
        }

        #[test]
        fn test_color_zero_is_greyscale() {
            let out = enhance(gradient(6, 6), EnhanceKind::Color, 0.0);
            assert!(out.pixels().all(|p| p.0[0] == p.0[1] && p.0[1] == p.0[2]));
        }

        #[test]
        fn test_grey_pixel_unaffected_by_color() {
            let img = RgbImage::from_pixel(2, 2, Rgb([90, 90, 90]));
            assert_eq!(enhance(img.clone(), EnhanceKind::Color, 1.8), img);
        }

        #[test]
        fn test_brightness_scales_and_clips() {
            let img = RgbImage::from_pixel(1, 1, Rgb([100, 200, 250]));
            let out = enhance(img, EnhanceKind::Brightness, 1.08);
            assert_eq!(out.get_pixel(0, 0).0, [108, 216, 255]);
        }

        #[test]
        fn test_contrast_pivots_on_mean_luma() {
            let mut img = RgbImage::from_pixel(2, 1, Rgb([100, 100, 100]));
            img.put_pixel(1, 0, Rgb([200, 200, 200]));
            let out = enhance(img, EnhanceKind::Contrast, 1.4);
            // mean luma 150: 150 + 1.4 * (100 - 150) = 80, 150 + 1.4 * 50 = 220
            assert_eq!(out.get_pixel(0, 0).0, [80, 80, 80]);
            assert_eq!(out.get_pixel(1, 0).0, [220, 220, 220]);
        }

        #[test]
        fn test_contrast_clips_each_pass() {
            let mut img = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
            img.put_pixel(1, 0, Rgb([255, 255, 255]));
            let out = enhance(img, EnhanceKind::Contrast, 3.0);
            assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
            assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255]);
        }

        #[test]
        fn test_sharpness_keeps_border() {
            let img = gradient(7, 5);
            let out = enhance(img.clone(), EnhanceKind::Sharpness, 0.6);
            for x in 0..7 {
                assert_eq!(out.get_pixel(x, 0), img.get_pixel(x, 0));
                assert_eq!(out.get_pixel(x, 4), img.get_pixel(x, 4));
            }
            for y in 0..5 {
                assert_eq!(out.get_pixel(0, y), img.get_pixel(0, y));
                assert_eq!(out.get_pixel(6, y), img.get_pixel(6, y));
            }
        }

        #[test]
        fn test_sharpness_below_one_softens_spike() {
            let mut img = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
            img.put_pixel(2, 2, Rgb([255, 255, 255]));
            let out = enhance(img, EnhanceKind::Sharpness, 0.6);
            let center = out.get_pixel(2, 2).0[0];
            assert!(center < 255);
            assert!(out.get_pixel(1, 2).0[0] > 0);
        }

        #[test]
        fn test_sharpness_tiny_image_is_noop() {
            let img = gradient(2, 2);
            assert_eq!(enhance(img.clone(), EnhanceKind::Sharpness, 0.2), img);
        }

        #[test]
        fn test_passes_do_not_commute() {
            let img = gradient(16, 16);
            let a = enhance(
                enhance(img.clone(), EnhanceKind::Brightness, 1.3),
                EnhanceKind::Contrast,
                1.4,
            );
            let b = enhance(
                enhance(img, EnhanceKind::Contrast, 1.4),
                EnhanceKind::Brightness,
                1.3,
            );
            assert_ne!(a, b);
        }
    }
}

// src/engine/texture.rs
//
// Canvas texture: seeded Gaussian grain, warm-tone channel gain and
// posterization. Values are computed in f32, clipped, then truncated to u8.

use crate::error::{Result, StylizeError};
use image::RgbImage;
use rand::Rng;
use rand_distr::{Distribution, Normal};

fn normal(sigma: f32) -> Result<Normal<f32>> {
    Normal::new(0.0, sigma).map_err(|e| {
        StylizeError::invalid_argument("noise sigma", sigma.to_string(), e.to_string())
    })
}

#[inline]
fn store(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// One N(0, sigma) draw per pixel, clipped to [-clip, clip] and added to all
/// three channels. Draws are taken in row-major pixel order.
pub fn luma_noise<R: Rng + ?Sized>(
    mut img: RgbImage,
    sigma: f32,
    clip: f32,
    rng: &mut R,
) -> Result<RgbImage> {
    if !clip.is_finite() || clip < 0.0 {
        return Err(StylizeError::invalid_argument(
            "noise clip",
            clip.to_string(),
            "must be a finite, non-negative number",
        ));
    }
    let dist = normal(sigma)?;
    for px in img.pixels_mut() {
        let n = dist.sample(rng).clamp(-clip, clip);
        for v in px.0.iter_mut() {
            *v = store(*v as f32 + n);
        }
    }
    Ok(img)
}

/// Independent N(0, sigma) draw per channel value. Each draw is truncated
/// toward zero before it is added, so the grain is unbiased.
pub fn channel_noise<R: Rng + ?Sized>(
    mut img: RgbImage,
    sigma: f32,
    rng: &mut R,
) -> Result<RgbImage> {
    let dist = normal(sigma)?;
    for v in img.iter_mut() {
        let n = dist.sample(rng) as i16;
        *v = (*v as i16 + n).clamp(0, 255) as u8;
    }
    Ok(img)
}

pub fn warm_tone(mut img: RgbImage, r: f32, g: f32, b: f32) -> RgbImage {
    let gains = [r, g, b];
    for px in img.pixels_mut() {
        for (v, gain) in px.0.iter_mut().zip(gains) {
            *v = store(*v as f32 * gain);
        }
    }
    img
}

/// Posterize every channel down to multiples of `step`.
pub fn quantize(mut img: RgbImage, step: u8) -> Result<RgbImage> {
    if step == 0 {
        return Err(StylizeError::invalid_argument(
            "quantize step",
            "0",
            "must be at least 1",
        ));
    }
    for v in img.iter_mut() {
        *v = *v / step * step;
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn mid_grey(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([128, 128, 128]))
    }

    #[test]
    fn test_luma_noise_same_offset_on_all_channels() {
        let mut rng = StdRng::seed_from_u64(7);
        let out = luma_noise(mid_grey(32, 32), 0.4, 1.0, &mut rng).unwrap();
        for px in out.pixels() {
            assert_eq!(px.0[0], px.0[1]);
            assert_eq!(px.0[1], px.0[2]);
        }
    }

    #[test]
    fn test_luma_noise_is_bounded_by_clip() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = luma_noise(mid_grey(64, 64), 50.0, 1.0, &mut rng).unwrap();
        // 128 + [-1, 1] truncates into 127..=129
        assert!(out.iter().all(|&v| (127..=129).contains(&v)));
    }

    #[test]
    fn test_luma_noise_clips_at_range_ends() {
        let mut rng = StdRng::seed_from_u64(3);
        let white = RgbImage::from_pixel(16, 16, Rgb([255, 255, 255]));
        let out = luma_noise(white, 0.4, 1.0, &mut rng).unwrap();
        assert!(out.iter().all(|&v| v >= 254));
        let black = RgbImage::new(16, 16);
        let out = luma_noise(black, 0.4, 1.0, &mut rng).unwrap();
        assert!(out.iter().all(|&v| v <= 1));
    }

    #[test]
    fn test_same_seed_same_grain() {
        let a = channel_noise(mid_grey(20, 20), 3.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = channel_noise(mid_grey(20, 20), 3.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let c = channel_noise(mid_grey(20, 20), 3.0, &mut StdRng::seed_from_u64(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_sigma_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(channel_noise(mid_grey(2, 2), f32::NAN, &mut rng).is_err());
    }

    #[test]
    fn test_invalid_clip_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        for clip in [f32::NAN, f32::INFINITY, -1.0] {
            let err = luma_noise(mid_grey(2, 2), 0.4, clip, &mut rng).unwrap_err();
            assert!(matches!(err, StylizeError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn test_channel_noise_keeps_mean() {
        let mut rng = StdRng::seed_from_u64(1);
        let out = channel_noise(mid_grey(200, 200), 3.0, &mut rng).unwrap();
        let mean = out.iter().map(|&v| v as f64).sum::<f64>() / out.len() as f64;
        assert!((mean - 128.0).abs() < 0.1, "mean drifted to {mean}");
    }

    #[test]
    fn test_warm_tone_gains_and_clip() {
        let img = RgbImage::from_pixel(1, 1, Rgb([250, 120, 110]));
        let out = warm_tone(img, 1.05, 1.02, 0.95);
        assert_eq!(out.get_pixel(0, 0).0, [255, 122, 104]);
    }

    #[test]
    fn test_quantize() {
        let img = RgbImage::from_pixel(1, 1, Rgb([15, 16, 255]));
        assert_eq!(quantize(img, 16).unwrap().get_pixel(0, 0).0, [0, 16, 240]);
        assert!(quantize(mid_grey(1, 1), 0).is_err());
    }
}

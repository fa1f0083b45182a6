// src/engine/alpha.rs
//
// Alpha separation: split a decoded image into an opaque RGB buffer and an
// optional alpha mask, and put them back together after stylization.

use crate::error::{Result, StylizeError};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
use std::borrow::Cow;

/// Opaque color buffer plus the mask captured from the source, if it had one.
#[derive(Clone, Debug)]
pub struct Separated {
    pub rgb: RgbImage,
    pub mask: Option<GrayImage>,
}

impl Separated {
    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }
}

/// Split `img` into RGB8 color and an 8-bit alpha mask.
///
/// The mask is `None` when the source carries no alpha channel. 16-bit and
/// float sources are narrowed to 8 bits by the image crate's conversion.
pub fn separate(img: &DynamicImage) -> Separated {
    if !img.color().has_alpha() {
        return Separated {
            rgb: img.to_rgb8(),
            mask: None,
        };
    }

    let rgba = match img {
        DynamicImage::ImageRgba8(rgba) => Cow::Borrowed(rgba),
        other => Cow::Owned(other.to_rgba8()),
    };
    let (width, height) = rgba.dimensions();
    let mut rgb = RgbImage::new(width, height);
    let mut mask = GrayImage::new(width, height);
    for ((src, dst), alpha) in rgba
        .pixels()
        .zip(rgb.pixels_mut())
        .zip(mask.pixels_mut())
    {
        let [r, g, b, a] = src.0;
        *dst = Rgb([r, g, b]);
        *alpha = Luma([a]);
    }

    Separated {
        rgb,
        mask: Some(mask),
    }
}

/// Rebuild an RGBA image from a stylized color buffer and a mask.
///
/// The alpha channel is a straight byte copy of `mask`; without a mask the
/// result is fully opaque.
pub fn recompose(rgb: &RgbImage, mask: Option<&GrayImage>) -> Result<RgbaImage> {
    let (width, height) = rgb.dimensions();
    match mask {
        Some(mask) => {
            if mask.dimensions() != (width, height) {
                return Err(StylizeError::mask_mismatch(
                    (width, height),
                    mask.dimensions(),
                ));
            }
            let mut out = RgbaImage::new(width, height);
            for ((dst, src), alpha) in out.pixels_mut().zip(rgb.pixels()).zip(mask.pixels()) {
                let [r, g, b] = src.0;
                *dst = Rgba([r, g, b, alpha.0[0]]);
            }
            Ok(out)
        }
        None => Ok(DynamicImage::ImageRgb8(rgb.clone()).into_rgba8()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, ((x * 37 + y * 11) % 256) as u8])
        }))
    }

    #[test]
    fn test_separate_rgb_has_no_mask() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])));
        let separated = separate(&img);
        assert!(separated.mask.is_none());
        assert_eq!(separated.dimensions(), (4, 3));
    }

    #[test]
    fn test_separate_luma_alpha_yields_mask() {
        let img = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
            2,
            2,
            image::LumaA([90, 17]),
        ));
        let separated = separate(&img);
        let mask = separated.mask.expect("luma-alpha carries alpha");
        assert!(mask.pixels().all(|p| p.0[0] == 17));
        assert!(separated.rgb.pixels().all(|p| p.0 == [90, 90, 90]));
    }

    #[test]
    fn test_roundtrip_is_exact() {
        let img = create_test_image_rgba(17, 9);
        let separated = separate(&img);
        let rebuilt = recompose(&separated.rgb, separated.mask.as_ref()).unwrap();
        assert_eq!(rebuilt.as_raw(), img.to_rgba8().as_raw());
    }

    #[test]
    fn test_recompose_without_mask_is_opaque() {
        let rgb = RgbImage::from_pixel(3, 3, Rgb([10, 20, 30]));
        let out = recompose(&rgb, None).unwrap();
        assert!(out.pixels().all(|p| p.0 == [10, 20, 30, 255]));
    }

    #[test]
    fn test_recompose_rejects_mismatched_mask() {
        let rgb = RgbImage::new(4, 4);
        let mask = GrayImage::new(4, 3);
        let err = recompose(&rgb, Some(&mask)).unwrap_err();
        assert!(matches!(err, StylizeError::MaskMismatch { .. }));
    }
}

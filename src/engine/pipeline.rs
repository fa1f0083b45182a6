// src/engine/pipeline.rs
//
// Stage runner and final compositor.
//
// Fixed linear sequence: separate -> downscale -> body (profile stages, or a
// style-transfer model) -> upscale -> finish -> reattach the original alpha.
// No stage starts before the previous buffer is fully materialized.

use super::alpha::{self, Separated};
use super::blur;
use super::enhance;
use super::resample::{self, ResamplePlan, SizePolicy};
use super::strategy::{AppliedStrategy, Strategy};
use super::texture;
use crate::error::{Result, StylizeError};
use crate::ops::{Stage, StyleProfile};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, debug_span, info, warn};

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct Stylized {
    pub image: RgbaImage,
    pub strategy: AppliedStrategy,
    /// Resolution the body ran at
    pub working: (u32, u32),
    pub seed: u64,
}

/// Apply a single stage to `img`. Random stages draw from `rng`.
pub fn apply_stage<R: Rng + ?Sized>(
    img: RgbImage,
    stage: &Stage,
    rng: &mut R,
) -> Result<RgbImage> {
    match *stage {
        Stage::GaussianBlend { radius, weight } => blur::gaussian_blend(img, radius, weight),
        Stage::Enhance { kind, factor } => Ok(enhance::enhance(img, kind, factor)),
        Stage::LumaNoise { sigma, clip } => texture::luma_noise(img, sigma, clip, rng),
        Stage::ChannelNoise { sigma } => texture::channel_noise(img, sigma, rng),
        Stage::WarmTone { r, g, b } => Ok(texture::warm_tone(img, r, g, b)),
        Stage::Quantize { step } => texture::quantize(img, step),
        Stage::Bilateral {
            diameter,
            sigma_color,
            sigma_space,
        } => blur::bilateral(&img, diameter, sigma_color, sigma_space),
    }
}

/// Run `stages` in order, each consuming the previous buffer.
pub fn run_stages<R: Rng + ?Sized>(
    mut img: RgbImage,
    stages: &[Stage],
    rng: &mut R,
) -> Result<RgbImage> {
    for (index, stage) in stages.iter().enumerate() {
        let _span = debug_span!(
            "stage",
            index,
            name = stage.name(),
            traits = ?stage.traits()
        )
        .entered();
        let dims = img.dimensions();
        img = apply_stage(img, stage, rng)?;
        if img.dimensions() != dims {
            return Err(StylizeError::internal_panic(format!(
                "stage '{}' changed dimensions {dims:?} -> {:?}",
                stage.name(),
                img.dimensions()
            )));
        }
    }
    Ok(img)
}

/// Full pipeline over a decoded image.
pub struct Pipeline<'a> {
    profile: &'a StyleProfile,
    policy: SizePolicy,
    strategy: &'a Strategy,
    seed: u64,
}

impl<'a> Pipeline<'a> {
    pub fn new(profile: &'a StyleProfile, strategy: &'a Strategy, seed: u64) -> Self {
        Self {
            profile,
            policy: SizePolicy::default(),
            strategy,
            seed,
        }
    }

    pub fn with_policy(mut self, policy: SizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn run(&self, img: &DynamicImage) -> Result<Stylized> {
        let (width, height) = (img.width(), img.height());
        if width == 0 || height == 0 {
            return Err(StylizeError::empty_image(width, height));
        }

        let Separated { rgb, mask } = alpha::separate(img);
        let (working_rgb, working_mask, plan) =
            resample::down(rgb, mask.clone(), &self.policy)?;
        let working = plan.working;

        let (body, strategy) = self.body(working_rgb)?;
        info!(
            profile = self.profile.name,
            strategy = strategy.as_str(),
            width,
            height,
            working = ?working,
            "body complete"
        );
        let image = self.composite(body, working_mask, mask.as_ref(), &plan)?;

        Ok(Stylized {
            image,
            strategy,
            working,
            seed: self.seed,
        })
    }

    /// Deterministic stages, or the model's output when one is selected and succeeds.
    fn body(&self, working: RgbImage) -> Result<(RgbImage, AppliedStrategy)> {
        match self.strategy {
            Strategy::Deterministic => Ok((
                self.deterministic(working)?,
                AppliedStrategy::Deterministic,
            )),
            Strategy::Neural(handle) => match handle.transfer(&working) {
                Ok(styled) => Ok((styled, AppliedStrategy::Neural)),
                Err(err) if err.is_collaborator_failure() => {
                    warn!(error = %err, "style transfer unavailable, using deterministic pipeline");
                    Ok((self.deterministic(working)?, AppliedStrategy::NeuralFallback))
                }
                Err(err) => Err(err),
            },
        }
    }

    fn deterministic(&self, working: RgbImage) -> Result<RgbImage> {
        let _span = debug_span!(
            "profile",
            name = self.profile.name,
            seed = self.seed,
            traits = ?self.profile.traits()
        )
        .entered();
        let mut rng = StdRng::seed_from_u64(self.seed);
        run_stages(working, &self.profile.stages, &mut rng)
    }

    /// Restore resolution, run the finish stages, and attach the untouched
    /// source mask.
    fn composite(
        &self,
        body: RgbImage,
        working_mask: Option<GrayImage>,
        original_mask: Option<&GrayImage>,
        plan: &ResamplePlan,
    ) -> Result<RgbaImage> {
        let (restored, restored_mask) = resample::up(body, working_mask, plan)?;
        if let Some(m) = &restored_mask {
            if m.dimensions() != restored.dimensions() {
                return Err(StylizeError::mask_mismatch(
                    restored.dimensions(),
                    m.dimensions(),
                ));
            }
        }
        debug!(width = plan.original.0, height = plan.original.1, "finishing");

        // Independent of how many draws the body took.
        let mut rng = StdRng::seed_from_u64(self.seed);
        let finished = run_stages(restored, &self.profile.finish, &mut rng)?;
        alpha::recompose(&finished, original_mask)
    }
}

/// One-shot deterministic stylization with the given profile and seed.
pub fn stylize(img: &DynamicImage, profile: &StyleProfile, seed: u64) -> Result<Stylized> {
    Pipeline::new(profile, &Strategy::Deterministic, seed).run(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::strategy::{ModelHandle, StyleTransfer};
    use crate::ops::EnhanceKind;
    use image::{Luma, Rgb, Rgba};
    use std::sync::Arc;

    fn create_test_image_rgba(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            let a = if (x + y) % 3 == 0 { 0 } else { 255 };
            Rgba([(x % 256) as u8, (y % 256) as u8, 128, a])
        }))
    }

    struct Solid(Rgb<u8>);

    impl StyleTransfer for Solid {
        fn transfer(&self, content: &RgbImage) -> Result<RgbImage> {
            Ok(RgbImage::from_pixel(content.width(), content.height(), self.0))
        }
    }

    /// Returns a fixed-size output regardless of the content size.
    struct Thumbnail;

    impl StyleTransfer for Thumbnail {
        fn transfer(&self, _content: &RgbImage) -> Result<RgbImage> {
            Ok(RgbImage::from_fn(8, 8, |x, y| Rgb([x as u8 * 30, y as u8 * 30, 60])))
        }
    }

    struct Broken;

    impl StyleTransfer for Broken {
        fn transfer(&self, _content: &RgbImage) -> Result<RgbImage> {
            Err(StylizeError::style_transfer_failed("weights corrupted"))
        }
    }

    mod stage_tests {
        use super::*;

        #[test]
        fn test_apply_stage_keeps_dimensions() {
            let img = RgbImage::from_fn(9, 5, |x, y| Rgb([x as u8 * 20, y as u8 * 40, 7]));
            let mut rng = StdRng::seed_from_u64(0);
            let profile = StyleProfile::brush();
            let out = run_stages(img, &profile.stages, &mut rng).unwrap();
            assert_eq!(out.dimensions(), (9, 5));
        }

        #[test]
        fn test_invalid_stage_parameter_aborts() {
            let img = RgbImage::new(4, 4);
            let stages = [
                Stage::Enhance {
                    kind: EnhanceKind::Color,
                    factor: 1.2,
                },
                Stage::GaussianBlend {
                    radius: 1.0,
                    weight: 2.0,
                },
            ];
            let mut rng = StdRng::seed_from_u64(0);
            assert!(run_stages(img, &stages, &mut rng).is_err());
        }
    }

    mod pipeline_tests {
        use super::*;

        #[test]
        fn test_output_matches_input_dimensions_and_alpha() {
            let img = create_test_image_rgba(37, 21);
            let out = stylize(&img, &StyleProfile::brush(), 11).unwrap();
            assert_eq!(out.image.dimensions(), (37, 21));
            let src = img.to_rgba8();
            for (a, b) in src.pixels().zip(out.image.pixels()) {
                assert_eq!(a.0[3], b.0[3]);
            }
            assert_eq!(out.strategy, AppliedStrategy::Deterministic);
        }

        #[test]
        fn test_fixed_seed_is_reproducible() {
            let img = create_test_image_rgba(40, 30);
            let a = stylize(&img, &StyleProfile::brush(), 5).unwrap();
            let b = stylize(&img, &StyleProfile::brush(), 5).unwrap();
            assert_eq!(a.image.as_raw(), b.image.as_raw());
        }

        #[test]
        fn test_rgb_input_is_opaque() {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(6, 4, Rgb([90, 50, 20])));
            let out = stylize(&img, &StyleProfile::light(), 1).unwrap();
            assert!(out.image.pixels().all(|p| p.0[3] == 255));
        }

        #[test]
        fn test_single_pixel() {
            let img = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(
                1,
                1,
                image::LumaA([200, 77]),
            ));
            let out = stylize(&img, &StyleProfile::brush(), 0).unwrap();
            assert_eq!(out.image.dimensions(), (1, 1));
            assert_eq!(out.image.get_pixel(0, 0).0[3], 77);
            assert_eq!(out.working, (1, 1));
        }

        #[test]
        fn test_zero_area_rejected() {
            let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 5));
            let err = stylize(&img, &StyleProfile::brush(), 0).unwrap_err();
            assert!(matches!(err, StylizeError::EmptyImage { .. }));
        }

        #[test]
        fn test_large_input_runs_at_working_resolution() {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2100, 30, Rgb([1, 2, 3])));
            let profile = StyleProfile {
                name: "tonal",
                stages: vec![],
                finish: vec![],
            };
            let out = stylize(&img, &profile, 0).unwrap();
            assert_eq!(out.working, (1024, 15));
            assert_eq!(out.image.dimensions(), (2100, 30));
        }

        #[test]
        fn test_empty_profile_without_resample_is_identity() {
            let img = create_test_image_rgba(12, 12);
            let profile = StyleProfile {
                name: "none",
                stages: vec![],
                finish: vec![],
            };
            let out = stylize(&img, &profile, 0).unwrap();
            assert_eq!(out.image.as_raw(), img.to_rgba8().as_raw());
        }
    }

    mod strategy_tests {
        use super::*;

        #[test]
        fn test_neural_output_is_restored_and_finished() {
            let handle = Arc::new(ModelHandle::with_model(Arc::new(Solid(Rgb([100, 100, 100])))));
            let strategy = Strategy::Neural(handle);
            let profile = StyleProfile::brush();
            let img = create_test_image_rgba(20, 10);
            let out = Pipeline::new(&profile, &strategy, 0).run(&img).unwrap();
            assert_eq!(out.strategy, AppliedStrategy::Neural);
            assert_eq!(out.image.dimensions(), (20, 10));
            // flat grey through the finish triple: brightness 108, contrast pivots on itself
            let opaque = out.image.pixels().find(|p| p.0[3] == 255).unwrap();
            assert_eq!(&opaque.0[..3], &[108, 108, 108]);
        }

        #[test]
        fn test_small_neural_output_is_resized_to_source() {
            let handle = Arc::new(ModelHandle::with_model(Arc::new(Thumbnail)));
            let strategy = Strategy::Neural(handle);
            let profile = StyleProfile::brush();
            let img = create_test_image_rgba(33, 19);
            let out = Pipeline::new(&profile, &strategy, 0).run(&img).unwrap();
            assert_eq!(out.image.dimensions(), (33, 19));
            let src = img.to_rgba8();
            assert!(src
                .pixels()
                .zip(out.image.pixels())
                .all(|(a, b)| a.0[3] == b.0[3]));
        }

        #[test]
        fn test_failing_model_falls_back_completely() {
            let handle = Arc::new(ModelHandle::with_model(Arc::new(Broken)));
            let strategy = Strategy::Neural(handle);
            let profile = StyleProfile::brush();
            let img = create_test_image_rgba(24, 16);
            let fallback = Pipeline::new(&profile, &strategy, 9).run(&img).unwrap();
            let direct = stylize(&img, &profile, 9).unwrap();
            assert_eq!(fallback.strategy, AppliedStrategy::NeuralFallback);
            assert_eq!(fallback.image.as_raw(), direct.image.as_raw());
        }

        #[test]
        fn test_unloadable_model_falls_back() {
            let handle = Arc::new(ModelHandle::new(|| {
                Err(StylizeError::model_unavailable("no weights on disk"))
            }));
            let strategy = Strategy::Neural(handle);
            let profile = StyleProfile::light();
            let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([40])));
            let out = Pipeline::new(&profile, &strategy, 3).run(&img).unwrap();
            assert_eq!(out.strategy, AppliedStrategy::NeuralFallback);
        }
    }
}

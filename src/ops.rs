// src/ops.rs
//
// Stylization stages and the profiles that order them.
// These are plain parameter records - the pixel work happens in engine/.

use bitflags::bitflags;

/// Enhancement pass, each defined relative to a neutral baseline (factor 1.0 = unchanged).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnhanceKind {
    /// Blend against the luma-only version of the image
    Color,
    /// Blend against flat grey at the image's mean luma
    Contrast,
    /// Blend against black
    Brightness,
    /// Blend against a 3x3 smoothed copy; factors below 1.0 soften
    Sharpness,
}

impl EnhanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnhanceKind::Color => "color",
            EnhanceKind::Contrast => "contrast",
            EnhanceKind::Brightness => "brightness",
            EnhanceKind::Sharpness => "sharpness",
        }
    }
}

/// One stage of a style profile.
///
/// Each stage consumes the current RGB buffer and yields a new one of the same
/// dimensions. Every stage clips its output to [0, 255].
#[derive(Clone, Debug, PartialEq)]
pub enum Stage {
    /// `current = (1 - weight) * current + weight * gaussian(current, radius)`.
    /// A weight of 1.0 replaces the image with its blur.
    GaussianBlend { radius: f32, weight: f32 },

    /// Multiplicative enhancement pass
    Enhance { kind: EnhanceKind, factor: f32 },

    /// One N(0, sigma) draw per pixel, clipped to [-clip, clip], added to R, G and B alike
    LumaNoise { sigma: f32, clip: f32 },

    /// Independent N(0, sigma) draws per channel
    ChannelNoise { sigma: f32 },

    /// Per-channel gain
    WarmTone { r: f32, g: f32, b: f32 },

    /// Posterize: `v / step * step`
    Quantize { step: u8 },

    /// Edge-preserving smoothing over a `diameter` window
    Bilateral {
        diameter: u32,
        sigma_color: f32,
        sigma_space: f32,
    },
}

bitflags! {
    /// Static traits of a stage, recorded on the stage and profile spans.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StageTraits: u8 {
        /// Draws from the seeded noise source
        const RANDOM = 0b0000_0001;
        /// Reads neighbouring pixels (needs a full buffer, not a per-pixel map)
        const SPATIAL = 0b0000_0010;
    }
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::GaussianBlend { .. } => "gaussian_blend",
            Stage::Enhance { kind, .. } => kind.as_str(),
            Stage::LumaNoise { .. } => "luma_noise",
            Stage::ChannelNoise { .. } => "channel_noise",
            Stage::WarmTone { .. } => "warm_tone",
            Stage::Quantize { .. } => "quantize",
            Stage::Bilateral { .. } => "bilateral",
        }
    }

    pub fn traits(&self) -> StageTraits {
        match self {
            Stage::GaussianBlend { .. } | Stage::Bilateral { .. } => StageTraits::SPATIAL,
            Stage::Enhance {
                kind: EnhanceKind::Sharpness,
                ..
            } => StageTraits::SPATIAL,
            // Contrast needs the global mean but no neighbourhood.
            Stage::Enhance { .. } => StageTraits::empty(),
            Stage::LumaNoise { .. } | Stage::ChannelNoise { .. } => StageTraits::RANDOM,
            Stage::WarmTone { .. } | Stage::Quantize { .. } => StageTraits::empty(),
        }
    }

    fn enhance(kind: EnhanceKind, factor: f32) -> Self {
        Stage::Enhance { kind, factor }
    }

    fn blend(radius: f32, weight: f32) -> Self {
        Stage::GaussianBlend { radius, weight }
    }
}

// =============================================================================
// PROFILES - named stage orderings
// =============================================================================

/// An ordered set of stage parameters run by the engine.
///
/// `stages` run at working resolution; `finish` runs after the image is restored
/// to its original size and before the original alpha mask is reattached.
#[derive(Clone, Debug, PartialEq)]
pub struct StyleProfile {
    pub name: &'static str,
    pub stages: Vec<Stage>,
    pub finish: Vec<Stage>,
}

impl StyleProfile {
    /// Get the built-in profile by name
    pub fn get(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "brush" => Some(Self::brush()),
            "light" => Some(Self::light()),
            _ => None,
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["brush", "light"]
    }

    /// Canonical oil-brush profile.
    ///
    /// Blur cascade, tonal pass, canvas texture, then two softening rounds.
    pub fn brush() -> Self {
        Self {
            name: "brush",
            stages: vec![
                // blur cascade
                Self::full_blur(1.5),
                Stage::blend(2.5, 0.45),
                Stage::blend(1.8, 0.25),
                // tonal
                Stage::enhance(EnhanceKind::Color, 1.05),
                Stage::enhance(EnhanceKind::Contrast, 1.05),
                Stage::enhance(EnhanceKind::Brightness, 1.01),
                Stage::enhance(EnhanceKind::Sharpness, 0.6),
                // texture
                Stage::LumaNoise {
                    sigma: 0.4,
                    clip: 1.0,
                },
                Stage::WarmTone {
                    r: 1.05,
                    g: 1.02,
                    b: 0.95,
                },
                Stage::enhance(EnhanceKind::Color, 1.02),
                Stage::blend(1.2, 0.35),
                Stage::blend(2.0, 0.15),
            ],
            finish: Self::default_finish(),
        }
    }

    /// Reduced-parameter profile: posterize, one blur, crisp tonal pass,
    /// bilateral smoothing and coarse per-channel grain.
    pub fn light() -> Self {
        Self {
            name: "light",
            stages: vec![
                Stage::Quantize { step: 16 },
                Self::full_blur(1.5),
                Stage::enhance(EnhanceKind::Sharpness, 1.5),
                Stage::enhance(EnhanceKind::Contrast, 1.2),
                Stage::enhance(EnhanceKind::Color, 1.1),
                Stage::Bilateral {
                    diameter: 15,
                    sigma_color: 80.0,
                    sigma_space: 80.0,
                },
                Stage::ChannelNoise { sigma: 3.0 },
            ],
            finish: Self::default_finish(),
        }
    }

    fn full_blur(radius: f32) -> Stage {
        Stage::blend(radius, 1.0)
    }

    fn default_finish() -> Vec<Stage> {
        vec![
            Stage::enhance(EnhanceKind::Brightness, 1.08),
            Stage::enhance(EnhanceKind::Color, 1.10),
            Stage::enhance(EnhanceKind::Contrast, 1.40),
        ]
    }

    /// Union of the traits of every stage, finish included.
    pub fn traits(&self) -> StageTraits {
        self.stages
            .iter()
            .chain(self.finish.iter())
            .fold(StageTraits::empty(), |acc, stage| acc | stage.traits())
    }
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self::brush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_is_case_insensitive() {
        assert_eq!(StyleProfile::get("BRUSH"), Some(StyleProfile::brush()));
        assert_eq!(StyleProfile::get("Light"), Some(StyleProfile::light()));
        assert!(StyleProfile::get("watercolor").is_none());
    }

    #[test]
    fn test_brush_stage_order() {
        let names: Vec<&str> = StyleProfile::brush()
            .stages
            .iter()
            .map(Stage::name)
            .collect();
        assert_eq!(
            names,
            vec![
                "gaussian_blend",
                "gaussian_blend",
                "gaussian_blend",
                "color",
                "contrast",
                "brightness",
                "sharpness",
                "luma_noise",
                "warm_tone",
                "color",
                "gaussian_blend",
                "gaussian_blend",
            ]
        );
    }

    #[test]
    fn test_brush_blur_cascade_parameters() {
        let profile = StyleProfile::brush();
        assert_eq!(
            &profile.stages[..3],
            &[
                Stage::GaussianBlend {
                    radius: 1.5,
                    weight: 1.0
                },
                Stage::GaussianBlend {
                    radius: 2.5,
                    weight: 0.45
                },
                Stage::GaussianBlend {
                    radius: 1.8,
                    weight: 0.25
                },
            ]
        );
    }

    #[test]
    fn test_finish_triple_order() {
        let finish = StyleProfile::brush().finish;
        assert_eq!(
            finish,
            vec![
                Stage::Enhance {
                    kind: EnhanceKind::Brightness,
                    factor: 1.08
                },
                Stage::Enhance {
                    kind: EnhanceKind::Color,
                    factor: 1.10
                },
                Stage::Enhance {
                    kind: EnhanceKind::Contrast,
                    factor: 1.40
                },
            ]
        );
        assert_eq!(StyleProfile::light().finish, finish);
    }

    #[test]
    fn test_profile_traits() {
        let traits = StyleProfile::brush().traits();
        assert!(traits.contains(StageTraits::RANDOM | StageTraits::SPATIAL));
        let tonal_only = StyleProfile {
            name: "tonal",
            stages: vec![Stage::enhance(EnhanceKind::Contrast, 1.2)],
            finish: vec![],
        };
        assert!(tonal_only.traits().is_empty());
    }
}

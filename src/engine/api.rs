// src/engine/api.rs
//
// Public entry points: StylizeOptions (builder) and the one-shot
// stylize_image / stylize_bytes / stylize_file functions.

use crate::engine::io::Source;
use crate::engine::limits::{LimitsConfig, LimitsPolicy};
use crate::engine::pipeline::{Pipeline, Stylized};
use crate::engine::resample::SizePolicy;
use crate::engine::strategy::{ModelHandle, Strategy};
use crate::engine::tasks::{StylizeOutput, StylizeTask};
use crate::error::{Result, StylizeError};
use crate::ops::StyleProfile;
use crate::ProcessingMetrics;
use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

/// Everything one invocation needs besides the image itself.
#[derive(Clone, Debug)]
pub struct StylizeOptions {
    pub profile: StyleProfile,
    /// Noise seed. `None` draws one per invocation; the value used is reported
    /// in the metrics so a run can be reproduced.
    pub seed: Option<u64>,
    pub limits: LimitsConfig,
    /// Lossless oxipng pass over the output
    pub optimize_png: bool,
    pub strategy: Strategy,
    pub size_policy: SizePolicy,
}

impl Default for StylizeOptions {
    fn default() -> Self {
        Self {
            profile: StyleProfile::default(),
            seed: None,
            limits: LimitsConfig::default(),
            optimize_png: true,
            strategy: Strategy::Deterministic,
            size_policy: SizePolicy::default(),
        }
    }
}

impl StylizeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a built-in profile by name (`brush`, `light`).
    pub fn profile_name(mut self, name: &str) -> Result<Self> {
        self.profile = StyleProfile::get(name)
            .ok_or_else(|| StylizeError::invalid_profile(name.to_string()))?;
        Ok(self)
    }

    pub fn profile(mut self, profile: StyleProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits_policy(self, policy: LimitsPolicy) -> Self {
        self.limits(LimitsConfig::apply_policy(policy))
    }

    pub fn optimize_png(mut self, optimize: bool) -> Self {
        self.optimize_png = optimize;
        self
    }

    /// Prefer an external style-transfer model, falling back to the
    /// deterministic stages when it is unavailable or fails.
    pub fn neural(mut self, model: Arc<ModelHandle>) -> Self {
        self.strategy = Strategy::Neural(model);
        self
    }

    pub fn size_policy(mut self, policy: SizePolicy) -> Self {
        self.size_policy = policy;
        self
    }

    /// Seed for this invocation, drawing one if none was set.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

/// Stylize an already-decoded image. No limits are applied beyond the
/// zero-area check.
pub fn stylize_image(img: &DynamicImage, options: &StylizeOptions) -> Result<Stylized> {
    Pipeline::new(&options.profile, &options.strategy, options.resolve_seed())
        .with_policy(options.size_policy)
        .run(img)
}

/// Decode, stylize and encode to PNG bytes.
pub fn stylize_bytes(bytes: &[u8], options: &StylizeOptions) -> Result<StylizeOutput> {
    StylizeTask::new(Source::from_bytes(bytes), options.clone()).run()
}

/// Read `input`, stylize, and write a verified PNG to `output`.
pub fn stylize_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &StylizeOptions,
) -> Result<ProcessingMetrics> {
    let source = Source::map_file(input)?;
    StylizeTask::new(source, options.clone()).run_to_file(output.as_ref())
}

// lib.rs
//
// brush-stylize: turns cut-out portraits into a hand-painted look while
// keeping the alpha channel exactly as it came in.
//
// Pipeline:
// - Alpha separation (RGB content + original mask)
// - Adaptive downscale to a working resolution
// - Blur cascade, tonal adjustment, texture noise
// - Upscale, then recompose with the original mask

// Memory allocator optimization - jemalloc for better performance
// Note: jemalloc is not supported on Windows/MSVC, so we exclude it on that platform
#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

pub mod engine;
pub mod error;
pub mod ops;

use serde::Serialize;

pub use engine::{
    stylize_batch, stylize_bytes, stylize_file, stylize_image, BatchJob, BatchResult,
    LimitsConfig, LimitsPolicy, ModelHandle, Strategy, StyleTransfer, StylizeOptions,
};
pub use error::{ErrorCategory, Result, StylizeError};
pub use ops::StyleProfile;

/// Get library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Metrics payload version. Bump when fields change meaning.
pub const PROCESSING_METRICS_VERSION: &str = "1.0.0";

/// Per-invocation timings and sizes, reported in the CLI status object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingMetrics {
    /// Schema version for compatibility negotiation
    pub version: String,
    /// Decode stage duration in milliseconds
    pub decode_ms: f64,
    /// Stylization (all pipeline stages) duration in milliseconds
    pub stylize_ms: f64,
    /// Encode and write duration in milliseconds
    pub encode_ms: f64,
    /// Total wall-clock duration in milliseconds
    pub total_ms: f64,
    /// Peak RSS in bytes.
    ///
    /// **Note**: this is `ru_maxrss` from `getrusage()`, the maximum of the
    /// whole process, not only this invocation.
    pub peak_rss: u64,
    /// Total CPU time (user + system) in seconds
    pub cpu_time: f64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Detected input format (lowercase: jpeg, png, webp)
    pub format_in: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Resolution the stylization stages ran at
    pub working_width: u32,
    pub working_height: u32,
    /// deterministic, neural or neural-fallback
    pub strategy: String,
    pub profile: String,
    /// Seed the texture stages used; rerun with it to reproduce the output
    pub seed: u64,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self {
            version: PROCESSING_METRICS_VERSION.to_string(),
            decode_ms: 0.0,
            stylize_ms: 0.0,
            encode_ms: 0.0,
            total_ms: 0.0,
            peak_rss: 0,
            cpu_time: 0.0,
            bytes_in: 0,
            bytes_out: 0,
            format_in: None,
            width: 0,
            height: 0,
            working_width: 0,
            working_height: 0,
            strategy: String::new(),
            profile: String::new(),
            seed: 0,
        }
    }
}

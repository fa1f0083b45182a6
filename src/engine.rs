// src/engine.rs
//
// The stylization engine. One call runs:
// 1. Alpha separation (RGB content + original mask)
// 2. Adaptive downscale to the working resolution
// 3. Blur cascade, tonal adjustment and texture noise (or a style-transfer model)
// 4. Restore to the original size and recompose with the original mask
//
// This file is a facade over the modules in engine/.

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Larger images are rejected before decode to stop decompression bombs.
pub const MAX_DIMENSION: u32 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 400MB uncompressed RGBA.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

pub mod alpha;
mod api;
pub mod blur;
mod common;
pub mod decoder;
pub mod encoder;
pub mod enhance;
mod io;
mod limits;
pub mod memory;
pub mod pipeline;
mod pool;
pub mod resample;
mod strategy;
mod tasks;
pub mod texture;

pub use api::{stylize_bytes, stylize_file, stylize_image, StylizeOptions};
pub use decoder::{check_dimensions, decode_image, inspect_dimensions};
pub use encoder::{encode_png, write_png_atomic};
pub use io::Source;
pub use limits::{LimitsConfig, LimitsPolicy};
pub use memory::{MemoryPermit, WeightedSemaphore};
pub use pipeline::{stylize, Pipeline, Stylized};
pub use pool::{get_pool, stylize_batch, BatchJob, BatchResult, THREADS_ENV};
pub use resample::{ResamplePlan, SizePolicy};
pub use strategy::{AppliedStrategy, ModelHandle, Strategy, StyleTransfer};
pub use tasks::{StylizeOutput, StylizeTask};

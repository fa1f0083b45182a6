// src/engine/tasks.rs
//
// One invocation end to end: limits -> decode -> stylize -> encode -> write,
// with per-stage timing and resource usage.

use crate::engine::api::StylizeOptions;
use crate::engine::decoder::{check_dimensions, decode_image, format_name, inspect_dimensions};
use crate::engine::encoder::{encode_png, write_png_atomic};
use crate::engine::io::Source;
use crate::engine::memory;
use crate::engine::pipeline::{Pipeline, Stylized};
use crate::error::Result;
use crate::{ProcessingMetrics, PROCESSING_METRICS_VERSION};
use std::path::Path;
use std::time::Instant;
use tracing::{info, info_span};

/// Resource usage information for telemetry
#[derive(Clone, Copy)]
struct ResourceUsage {
    cpu_time: f64,   // User + system CPU time in seconds
    memory_rss: u64, // Resident set size in bytes
}

/// Get current process resource usage (CPU time and RSS memory)
/// Returns None on unsupported platforms or if getrusage fails
#[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
fn get_resource_usage() -> Option<ResourceUsage> {
    use libc::{getrusage, rusage, RUSAGE_SELF};
    use std::mem;

    // SAFETY: getrusage only writes into the zeroed struct we own.
    unsafe {
        let mut usage: rusage = mem::zeroed();
        if getrusage(RUSAGE_SELF, &mut usage) != 0 {
            return None;
        }
        let cpu_time = usage.ru_utime.tv_sec as f64
            + usage.ru_utime.tv_usec as f64 / 1_000_000.0
            + usage.ru_stime.tv_sec as f64
            + usage.ru_stime.tv_usec as f64 / 1_000_000.0;

        // On Linux, ru_maxrss is in KB; on macOS/FreeBSD, it's in bytes
        #[cfg(target_os = "linux")]
        let memory_rss = usage.ru_maxrss as u64 * 1024;
        #[cfg(any(target_os = "macos", target_os = "freebsd"))]
        let memory_rss = usage.ru_maxrss as u64;

        Some(ResourceUsage {
            cpu_time,
            memory_rss,
        })
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "freebsd")))]
fn get_resource_usage() -> Option<ResourceUsage> {
    None
}

/// Measures decode -> stylize -> encode in milliseconds and fills CPU/memory
/// and I/O sizes in one place.
struct MetricsRecorder {
    metrics: ProcessingMetrics,
    start_total: Instant,
    stage_start: Instant,
    usage_start: Option<ResourceUsage>,
}

impl MetricsRecorder {
    fn new(input_size: u64) -> Self {
        let now = Instant::now();
        Self {
            metrics: ProcessingMetrics {
                bytes_in: input_size,
                ..ProcessingMetrics::default()
            },
            start_total: now,
            stage_start: now,
            usage_start: get_resource_usage(),
        }
    }

    fn lap(&mut self) -> f64 {
        let ms = self.stage_start.elapsed().as_secs_f64() * 1000.0;
        self.stage_start = Instant::now();
        ms
    }

    fn mark_decode_done(&mut self, format: &str) {
        self.metrics.decode_ms = self.lap();
        self.metrics.format_in = Some(format.to_string());
    }

    fn mark_stylize_done(&mut self, stylized: &Stylized, profile: &str) {
        self.metrics.stylize_ms = self.lap();
        let m = &mut self.metrics;
        (m.width, m.height) = stylized.image.dimensions();
        (m.working_width, m.working_height) = stylized.working;
        m.strategy = stylized.strategy.as_str().to_string();
        m.profile = profile.to_string();
        m.seed = stylized.seed;
    }

    fn finalize(mut self, output_len: u64) -> ProcessingMetrics {
        self.metrics.encode_ms = self.lap();
        let m = &mut self.metrics;
        m.total_ms = self.start_total.elapsed().as_secs_f64() * 1000.0;
        m.version = PROCESSING_METRICS_VERSION.to_string();
        m.bytes_out = output_len;

        match (self.usage_start, get_resource_usage()) {
            (Some(start), Some(end)) => {
                m.cpu_time = (end.cpu_time - start.cpu_time).max(0.0);
                m.peak_rss = end.memory_rss;
            }
            _ => {
                m.peak_rss = (m.width as u64 * m.height as u64 * 4).saturating_add(output_len);
            }
        }
        self.metrics
    }
}

/// Encoded result of one invocation.
#[derive(Debug, Clone)]
pub struct StylizeOutput {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub metrics: ProcessingMetrics,
}

pub struct StylizeTask {
    pub source: Source,
    pub options: StylizeOptions,
}

impl StylizeTask {
    pub fn new(source: Source, options: StylizeOptions) -> Self {
        Self { source, options }
    }

    /// Decode, stylize and encode. Every limit is checked before the
    /// corresponding buffer is allocated.
    pub fn run(&self) -> Result<StylizeOutput> {
        let _span = info_span!("stylize", source = %self.source.describe()).entered();
        let limits = &self.options.limits;
        let bytes = self.source.bytes();
        limits.enforce_source_len(bytes.len() as u64)?;

        if let Ok((width, height)) = inspect_dimensions(bytes) {
            check_dimensions(width, height)?;
            limits.enforce_pixels(width, height)?;
            memory::ensure_allocatable(width, height)?;
        }

        let mut recorder = MetricsRecorder::new(bytes.len() as u64);
        let (img, format) = decode_image(bytes)?;
        limits.enforce_pixels(img.width(), img.height())?;
        recorder.mark_decode_done(format_name(format));
        limits.enforce_timeout(recorder.start_total, "decode")?;

        let seed = self.options.resolve_seed();
        let stylized = Pipeline::new(&self.options.profile, &self.options.strategy, seed)
            .with_policy(self.options.size_policy)
            .run(&img)?;
        drop(img);
        recorder.mark_stylize_done(&stylized, self.options.profile.name);
        limits.enforce_timeout(recorder.start_total, "stylize")?;

        let png = encode_png(&stylized.image, self.options.optimize_png)?;
        let (width, height) = stylized.image.dimensions();
        let metrics = recorder.finalize(png.len() as u64);
        info!(
            width,
            height,
            strategy = %metrics.strategy,
            seed,
            total_ms = metrics.total_ms,
            "stylized"
        );

        Ok(StylizeOutput {
            png,
            width,
            height,
            metrics,
        })
    }

    /// `run`, then write atomically to `output`. Nothing is left at `output`
    /// unless the written file re-opens with the expected dimensions.
    pub fn run_to_file(&self, output: &Path) -> Result<ProcessingMetrics> {
        let out = self.run()?;
        let write_start = Instant::now();
        write_png_atomic(output, &out.png, (out.width, out.height))?;
        let mut metrics = out.metrics;
        let write_ms = write_start.elapsed().as_secs_f64() * 1000.0;
        metrics.encode_ms += write_ms;
        metrics.total_ms += write_ms;
        Ok(metrics)
    }
}

// src/engine/pool.rs
//
// Global thread pool and batch stylization.
//
// A single lazily-built rayon pool is shared by all batch calls. Its size is
// read once from STYLIZE_THREADS (or available_parallelism); changes after
// initialization have no effect.

use crate::engine::api::StylizeOptions;
use crate::engine::decoder::inspect_dimensions;
use crate::engine::io::Source;
use crate::engine::memory::{estimate_working_set, memory_semaphore};
use crate::engine::tasks::StylizeTask;
use crate::ProcessingMetrics;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::warn;

/// Environment variable overriding the batch thread count
pub const THREADS_ENV: &str = "STYLIZE_THREADS";

/// Minimum number of rayon threads to ensure at least some parallelism
const MIN_RAYON_THREADS: usize = 1;

static GLOBAL_THREAD_POOL: OnceLock<Option<ThreadPool>> = OnceLock::new();

fn configured_threads() -> usize {
    std::env::var(THREADS_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(MIN_RAYON_THREADS)
        })
}

/// Shared batch pool. `None` only if rayon could not spawn even a single
/// thread, in which case batches run on the caller's thread.
pub fn get_pool() -> Option<&'static ThreadPool> {
    GLOBAL_THREAD_POOL
        .get_or_init(|| {
            let num_threads = configured_threads();
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()
                .or_else(|e| {
                    warn!(num_threads, error = %e, "falling back to minimal thread pool");
                    rayon::ThreadPoolBuilder::new()
                        .num_threads(MIN_RAYON_THREADS)
                        .build()
                })
                .ok()
        })
        .as_ref()
}

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl BatchJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Outcome of one batch job; failures never abort the rest of the batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub source: String,
    pub success: bool,
    pub output_path: Option<String>,
    pub error: Option<String>,
    pub error_code: Option<&'static str>,
    pub category: Option<&'static str>,
    pub metrics: Option<ProcessingMetrics>,
}

fn run_job(job: &BatchJob, options: &StylizeOptions) -> BatchResult {
    let source_name = job.input.display().to_string();
    let outcome = Source::map_file(&job.input).and_then(|source| {
        // Weight by the header size when it is readable; undecodable inputs
        // fail inside the task without holding much memory.
        let weight = inspect_dimensions(source.bytes())
            .ok()
            .map(|(w, h)| estimate_working_set(w, h, &options.size_policy))
            .unwrap_or(0);
        let _permit = memory_semaphore().acquire(weight);
        StylizeTask::new(source, options.clone()).run_to_file(&job.output)
    });

    match outcome {
        Ok(metrics) => BatchResult {
            source: source_name,
            success: true,
            output_path: Some(job.output.display().to_string()),
            error: None,
            error_code: None,
            category: None,
            metrics: Some(metrics),
        },
        Err(err) => {
            warn!(source = %source_name, error = %err, "batch job failed");
            let category = err.category();
            BatchResult {
                source: source_name,
                success: false,
                output_path: None,
                error: Some(err.to_string()),
                error_code: Some(category.code()),
                category: Some(category.as_str()),
                metrics: None,
            }
        }
    }
}

/// Stylize every job in parallel. Results come back in job order.
///
/// With a fixed seed, job `i` uses `seed + i` so outputs stay reproducible
/// regardless of scheduling.
pub fn stylize_batch(jobs: &[BatchJob], options: &StylizeOptions) -> Vec<BatchResult> {
    let base_seed = options.resolve_seed();
    let work = || {
        jobs.par_iter()
            .enumerate()
            .map(|(i, job)| {
                let mut job_options = options.clone();
                job_options.seed = Some(base_seed.wrapping_add(i as u64));
                run_job(job, &job_options)
            })
            .collect::<Vec<_>>()
    };
    match get_pool() {
        Some(pool) => pool.install(work),
        None => work(),
    }
}

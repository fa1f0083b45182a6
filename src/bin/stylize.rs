use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use brush_stylize::{
    ErrorCategory, LimitsPolicy, ProcessingMetrics, StyleProfile, StylizeError, StylizeOptions,
};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stylize", version, about = "Hand-painted stylization that keeps alpha intact")]
struct Cli {
    /// Input image (PNG, JPEG or WebP).
    input: PathBuf,

    /// Output PNG path. Only written once the result has been verified.
    output: PathBuf,

    /// Style profile.
    #[arg(long, env = "STYLIZE_PROFILE", default_value = "brush")]
    profile: String,

    /// Seed for the texture noise; random when omitted.
    #[arg(long, env = "STYLIZE_SEED")]
    seed: Option<u64>,

    /// Input limits: strict, lenient or disabled.
    #[arg(long, default_value = "lenient")]
    limits: String,

    /// Print a JSON status object on stdout.
    #[arg(long)]
    json: bool,

    /// Skip the lossless PNG recompression pass.
    #[arg(long)]
    no_optimize: bool,

    /// Log at debug level (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,

    /// Worker threads for parallel stages.
    #[arg(long, env = "STYLIZE_THREADS")]
    threads: Option<usize>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Status {
    Success {
        success: bool,
        output_path: String,
        width: u32,
        height: u32,
        metrics: ProcessingMetrics,
    },
    Failure {
        success: bool,
        error: String,
        category: &'static str,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_options(cli: &Cli) -> anyhow::Result<StylizeOptions> {
    let policy: LimitsPolicy = cli.limits.parse()?;
    let available = StyleProfile::available().join(", ");
    let mut options = StylizeOptions::new()
        .profile_name(&cli.profile)
        .with_context(|| format!("available profiles: {available}"))?
        .limits_policy(policy)
        .optimize_png(!cli.no_optimize);
    if let Some(seed) = cli.seed {
        options = options.seed(seed);
    }
    Ok(options)
}

/// Size rayon's global pool. Returns false if it was already built.
fn configure_threads(threads: usize) -> bool {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.max(1))
        .build_global()
    {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(threads, error = %e, "global thread pool already configured");
            false
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<ProcessingMetrics> {
    if let Some(threads) = cli.threads {
        configure_threads(threads);
    }
    let options = build_options(cli)?;
    let metrics = brush_stylize::stylize_file(&cli.input, &cli.output, &options)
        .with_context(|| format!("stylizing '{}'", cli.input.display()))?;
    Ok(metrics)
}

fn category_of(err: &anyhow::Error) -> ErrorCategory {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StylizeError>())
        .map(StylizeError::category)
        .unwrap_or(ErrorCategory::InputError)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (status, code) = match run(&cli) {
        Ok(metrics) => (
            Status::Success {
                success: true,
                output_path: cli.output.display().to_string(),
                width: metrics.width,
                height: metrics.height,
                metrics,
            },
            ExitCode::SUCCESS,
        ),
        Err(err) => {
            let category = category_of(&err);
            tracing::error!(category = category.as_str(), "{err:#}");
            (
                Status::Failure {
                    success: false,
                    error: format!("{err:#}"),
                    category: category.as_str(),
                },
                ExitCode::from(category.exit_code() as u8),
            )
        }
    };

    if cli.json {
        match serde_json::to_string(&status) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!("failed to serialize status: {e}"),
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_thread_configuration_is_reported() {
        configure_threads(2);
        assert!(!configure_threads(3));
    }

    #[test]
    fn test_unknown_profile_lists_available() {
        let cli = Cli::parse_from(["stylize", "in.png", "out.png", "--profile", "sketch"]);
        let err = build_options(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("available profiles: brush, light"));
        assert_eq!(category_of(&err), ErrorCategory::InputError);
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

use framepair_core::backend::InferenceBackend;
use framepair_core::config::{config_path, AppConfig};
use framepair_core::logging::{self, FileSinkPlan, LoggingInitOptions, DEFAULT_LOG_FILTER};
use framepair_core::model_loader::{load_model, LoaderConfig};
use framepair_core::pipeline::{
    output_dir_from_env, run_pipeline, InterpolationRequest, SequenceMode,
};
use framepair_core::runtime::{log_runtime_lib_status, setup_runtime_libs};

#[derive(Parser, Debug)]
#[command(
    name = "framepair",
    about = "Interpolate in-between frames for an image pair with RIFE"
)]
struct Cli {
    #[arg(
        long = "img",
        num_args = 2,
        required = true,
        value_names = ["FIRST", "SECOND"],
        help = "The two input images"
    )]
    img: Vec<PathBuf>,

    #[arg(long, help = "Doubling rounds; writes 2^EXP + 1 frames [default: 4]")]
    exp: Option<u32>,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Target temporal ratio in [0, 1]; nonzero switches to a single-frame search"
    )]
    ratio: f64,

    #[arg(long, help = "Width of the accepted band around --ratio [default: 0.02]")]
    rthreshold: Option<f64>,

    #[arg(long, help = "Maximum inference cycles for the ratio search [default: 8]")]
    rmaxcycles: Option<u32>,

    #[arg(long, value_name = "DIR", help = "Directory holding the RIFE ONNX weights [default: train_log]")]
    model: Option<PathBuf>,

    #[arg(long, help = "Inference backend: cpu, cuda or tensorrt [default: cuda]")]
    backend: Option<InferenceBackend>,

    #[arg(long, value_name = "FILE", help = "TOML config file")]
    config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Increase log verbosity (-v: debug, -vv: trace)"
    )]
    verbose: u8,

    #[arg(
        long = "log-filter",
        value_name = "FILTER",
        help = "Explicit tracing filter (overrides RUST_LOG and -v)"
    )]
    log_filter: Option<String>,

    #[arg(long = "log-dir", value_name = "DIR", help = "Also write logs to a daily rolling file here")]
    log_dir: Option<PathBuf>,
}

/// Tunables after applying CLI > config file > default.
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    inputs: [PathBuf; 2],
    mode: SequenceMode,
    model_dir: PathBuf,
    trt_cache_dir: PathBuf,
    backend: InferenceBackend,
    use_iobinding: bool,
}

fn resolve_settings(cli: &Cli, config: &AppConfig) -> Result<Settings> {
    let inputs: [PathBuf; 2] = cli
        .img
        .clone()
        .try_into()
        .map_err(|paths: Vec<PathBuf>| {
            anyhow::anyhow!("expected exactly two --img paths, got {}", paths.len())
        })?;

    let mode = SequenceMode::select(
        cli.exp.unwrap_or(config.sequence.exp),
        cli.ratio,
        cli.rthreshold.unwrap_or(config.sequence.rthreshold),
        cli.rmaxcycles.unwrap_or(config.sequence.rmaxcycles),
    );

    Ok(Settings {
        inputs,
        mode,
        model_dir: cli
            .model
            .clone()
            .unwrap_or_else(|| config.paths.model_dir.clone()),
        trt_cache_dir: config.paths.trt_cache_dir.clone(),
        backend: cli.backend.unwrap_or(config.inference.backend),
        use_iobinding: config.inference.use_iobinding,
    })
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    // Checked before anything else touches the filesystem.
    let output_dir = output_dir_from_env()?;

    let cfg_path = config_path(cli.config.as_deref());
    let config = AppConfig::load_from_path(&cfg_path)?;

    let ort_dylib = setup_runtime_libs();
    init_logging(
        cli.log_dir.as_deref().or(config.logging.dir.as_deref()),
        config.logging.retention_files,
        cli.verbose,
        cli.log_filter.as_deref(),
    );

    log_runtime_lib_status(&ort_dylib);
    info!(
        pid = std::process::id(),
        config_path = %cfg_path.display(),
        output_dir = %output_dir.display(),
        "Runtime startup metadata"
    );

    let settings = resolve_settings(&cli, &config)?;
    let (variant, mut model) = load_model(&LoaderConfig {
        model_dir: &settings.model_dir,
        backend: settings.backend,
        trt_cache_dir: &settings.trt_cache_dir,
        use_iobinding: settings.use_iobinding,
    })?;
    info!(variant = %variant, format = %model.format(), backend = %settings.backend, "Model ready");

    let request = InterpolationRequest {
        inputs: settings.inputs,
        mode: settings.mode,
        output_dir,
    };
    let report = run_pipeline(&request, &mut model).context("interpolation failed")?;
    if let Some(position) = report.found_position {
        info!(position, "Found frame written as img1");
    }

    Ok(())
}

fn init_logging(
    log_dir: Option<&Path>,
    retention_files: usize,
    verbose: u8,
    cli_log_filter: Option<&str>,
) {
    let init_options = LoggingInitOptions {
        log_dir: log_dir.map(Path::to_path_buf),
        verbose,
        cli_log_filter: cli_log_filter.map(ToString::to_string),
        rust_log_env: std::env::var("RUST_LOG").ok(),
        retention_files,
    };
    let init_plan = logging::compose_logging_init_plan(&init_options);
    let filter = init_plan.filter;

    match init_plan.file_sink {
        FileSinkPlan::Ready(ready) => {
            let subscriber = tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_filter(parse_env_filter_with_fallback(&filter, "console")),
                )
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(ready.appender)
                        .with_filter(parse_env_filter_with_fallback(&filter, "file")),
                );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return;
            }

            info!(
                log_dir = %ready.log_dir.display(),
                retention_files = ready.retention_files,
                "Writing daily rolling log files"
            );
        }
        FileSinkPlan::Fallback(fallback) => {
            let subscriber = tracing_subscriber::registry().with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_filter(parse_env_filter_with_fallback(&filter, "console")),
            );

            if let Err(error) = tracing::subscriber::set_global_default(subscriber) {
                eprintln!(
                    "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
                );
                return;
            }

            // An unset log dir is the normal console-only mode.
            if let Some(attempted_log_dir) = fallback.attempted_log_dir {
                warn!(
                    attempted_log_dir = %attempted_log_dir.display(),
                    reason = %fallback.reason,
                    "Persistent file logging unavailable; continuing with console-only logging"
                );
            }
        }
    }
}

fn parse_env_filter_with_fallback(filter: &str, sink_name: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(filter).unwrap_or_else(|error| {
        eprintln!(
            "Invalid {sink_name} log filter '{filter}': {error}. Falling back to '{DEFAULT_LOG_FILTER}'."
        );
        tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

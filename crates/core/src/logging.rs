use std::{fs, path::PathBuf};

use tracing_appender::rolling::{RollingFileAppender, Rotation};

pub const DEFAULT_LOG_FILTER: &str = "info";
/// Prepended to implicitly chosen filters so ORT's session chatter stays quiet.
const ORT_NOISE_FILTER: &str = "ort=warn";
pub const DEFAULT_LOG_RETENTION_FILES: usize = 7;
const LOG_FILE_PREFIX: &str = "framepair";
const LOG_FILE_SUFFIX: &str = "log";

/// Inputs gathered from CLI, config and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingInitOptions {
    pub log_dir: Option<PathBuf>,
    pub verbose: u8,
    pub cli_log_filter: Option<String>,
    pub rust_log_env: Option<String>,
    /// Zero means [`DEFAULT_LOG_RETENTION_FILES`].
    pub retention_files: usize,
}

#[derive(Debug)]
pub struct LoggingInitPlan {
    pub filter: String,
    pub file_sink: FileSinkPlan,
}

#[derive(Debug)]
pub enum FileSinkPlan {
    Ready(ReadyFileSinkPlan),
    Fallback(FallbackFileSinkPlan),
}

#[derive(Debug)]
pub struct ReadyFileSinkPlan {
    pub log_dir: PathBuf,
    pub retention_files: usize,
    pub appender: RollingFileAppender,
}

/// `attempted_log_dir` is `None` when no directory was configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackFileSinkPlan {
    pub attempted_log_dir: Option<PathBuf>,
    pub reason: String,
}

pub fn compose_logging_init_plan(options: &LoggingInitOptions) -> LoggingInitPlan {
    LoggingInitPlan {
        filter: effective_log_filter(options),
        file_sink: build_file_sink_plan(options),
    }
}

/// Plan the daily rolling file sink. Any problem with the directory yields
/// `Fallback` and console logging carries on alone.
pub fn build_file_sink_plan(options: &LoggingInitOptions) -> FileSinkPlan {
    let Some(log_dir) = options.log_dir.clone() else {
        return FileSinkPlan::Fallback(FallbackFileSinkPlan {
            attempted_log_dir: None,
            reason: "file sink disabled: log dir is not configured".to_string(),
        });
    };

    if let Err(error) = fs::create_dir_all(&log_dir) {
        return FileSinkPlan::Fallback(FallbackFileSinkPlan {
            attempted_log_dir: Some(log_dir),
            reason: format!("failed to create log directory: {error}"),
        });
    }

    let retention_files = match options.retention_files {
        0 => DEFAULT_LOG_RETENTION_FILES,
        n => n,
    };

    let built = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(retention_files)
        .build(&log_dir);

    match built {
        Ok(appender) => FileSinkPlan::Ready(ReadyFileSinkPlan {
            log_dir,
            retention_files,
            appender,
        }),
        Err(error) => FileSinkPlan::Fallback(FallbackFileSinkPlan {
            attempted_log_dir: Some(log_dir),
            reason: format!("failed to initialize rolling file sink: {error}"),
        }),
    }
}

/// Precedence: `--log-filter`, then `-v`/`-vv`, then a non-blank `RUST_LOG`, then
/// [`DEFAULT_LOG_FILTER`]. The ORT noise filter is only added to the last two.
pub fn effective_log_filter(options: &LoggingInitOptions) -> String {
    if let Some(filter) = options.cli_log_filter.as_deref() {
        return filter.to_string();
    }
    match options.verbose {
        0 => {}
        1 => return "debug".to_string(),
        _ => return "trace".to_string(),
    }

    let implicit = options
        .rust_log_env
        .as_deref()
        .filter(|filter| !filter.trim().is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER);
    format!("{ORT_NOISE_FILTER},{implicit}")
}

//! Inference backend selection and `ort::Session` construction.
//!
//! The backend is an explicit value threaded from configuration into
//! [`build_session`]; nothing here touches process-wide device state.

use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use ort::{
    execution_providers::{CUDAExecutionProvider, ExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Execution provider selection.
///
/// `Cuda` silently degrades to CPU when no CUDA device is usable. `Tensorrt`
/// registers CUDA as its own fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    Cpu,
    #[default]
    Cuda,
    #[serde(alias = "trt")]
    Tensorrt,
}

impl FromStr for InferenceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "tensorrt" | "trt" => Ok(Self::Tensorrt),
            other => bail!("unknown backend '{other}' (expected cpu, cuda or tensorrt)"),
        }
    }
}

impl std::fmt::Display for InferenceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::Tensorrt => write!(f, "tensorrt"),
        }
    }
}

pub struct SessionConfig<'a> {
    pub model_path: &'a Path,
    pub backend: InferenceBackend,
    pub trt_cache_dir: &'a Path,
}

/// Build an `ort::Session` for `config.model_path` on the requested backend.
pub fn build_session(config: &SessionConfig<'_>) -> Result<Session> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;
    let started = Instant::now();

    let session = match config.backend {
        InferenceBackend::Cpu => {
            debug!(backend = "cpu", "Building session without execution providers");
            builder.commit_from_file(config.model_path)
        }
        InferenceBackend::Cuda => {
            let cuda = CUDAExecutionProvider::default();
            if !cuda.is_available().unwrap_or(false) {
                warn!("CUDA EP is not available, inference will fall back to CPU");
            }

            debug!(backend = "cuda", "Building session with CUDA EP");
            builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])?
                .commit_from_file(config.model_path)
        }
        InferenceBackend::Tensorrt => {
            let cache_dir = config.trt_cache_dir;
            let cache_path = cache_dir.to_string_lossy().to_string();
            if let Err(e) = std::fs::create_dir_all(cache_dir) {
                warn!(
                    dir = %cache_dir.display(),
                    error = %e,
                    "Failed to create TRT cache directory"
                );
            }

            info!(
                cache_dir = %cache_dir.display(),
                "Initializing TensorRT session (first run may take several minutes)"
            );

            // TRT EP fails at runtime without libnvinfer; CUDA EP picks up the work then.
            builder
                .with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_engine_cache(true)
                        .with_engine_cache_path(&cache_path)
                        .with_fp16(true)
                        .with_device_id(0)
                        .build(),
                    CUDAExecutionProvider::default().build(),
                ])?
                .commit_from_file(config.model_path)
        }
    }
    .with_context(|| format!("Failed to load ONNX model: {}", config.model_path.display()))?;

    debug!(
        backend = %config.backend,
        model = %config.model_path.display(),
        elapsed_ms = format!("{:.1}", started.elapsed().as_secs_f64() * 1000.0),
        "Session ready"
    );

    Ok(session)
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::backend::InferenceBackend;

const CONFIG_FILE_NAME: &str = "framepair.toml";
const ENV_CONFIG_PATH: &str = "FRAMEPAIR_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub inference: InferenceConfig,
    pub sequence: SequenceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub model_dir: PathBuf,
    pub trt_cache_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: InferenceBackend,
    pub use_iobinding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SequenceConfig {
    pub exp: u32,
    pub rthreshold: f64,
    pub rmaxcycles: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling log file; console only when unset.
    pub dir: Option<PathBuf>,
    pub retention_files: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("train_log"),
            trt_cache_dir: PathBuf::from("trt_cache"),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::default(),
            use_iobinding: true,
        }
    }
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            exp: 4,
            rthreshold: 0.02,
            rmaxcycles: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            retention_files: 7,
        }
    }
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config TOML: {}", path.display()))
    }
}

/// Resolve the config file with 3-tier priority:
/// 1. CLI override if provided
/// 2. FRAMEPAIR_CONFIG environment variable
/// 3. Default: ./framepair.toml
pub fn config_path(cli_override: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Some(env_path) = env::var_os(ENV_CONFIG_PATH).filter(|v| !v.is_empty()) {
        return PathBuf::from(env_path);
    }

    PathBuf::from(CONFIG_FILE_NAME)
}

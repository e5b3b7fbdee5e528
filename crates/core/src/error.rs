//! Error kinds callers need to tell apart. Everything else travels as `anyhow::Error`.

use std::path::PathBuf;

use thiserror::Error;

use crate::model_loader::ModelVariant;

/// One failed attempt in the model fallback chain.
#[derive(Debug)]
pub struct VariantFailure {
    pub variant: ModelVariant,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum InterpolateError {
    #[error("{var} is not defined")]
    MissingOutputDir { var: &'static str },

    #[error("no model variant could be loaded from {}: {}", model_dir.display(), summarize(attempts))]
    ModelChainExhausted {
        model_dir: PathBuf,
        attempts: Vec<VariantFailure>,
    },

    #[error("input frames differ in size: {first_w}x{first_h} vs {second_w}x{second_h}")]
    FrameSizeMismatch {
        first_w: usize,
        first_h: usize,
        second_w: usize,
        second_h: usize,
    },
}

fn summarize(attempts: &[VariantFailure]) -> String {
    attempts
        .iter()
        .map(|failure| format!("{} ({})", failure.variant, failure.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

//! Model variant fallback chain.
//!
//! Four historical RIFE interfaces are tried in a fixed order; each attempt is
//! a recoverable `Result`, the first success wins, and running out of
//! variants is reported as [`InterpolateError::ModelChainExhausted`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::backend::{build_session, InferenceBackend, SessionConfig};
use crate::error::{InterpolateError, VariantFailure};
use crate::interpolator::{session_format, ModelFormat, RifeModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    HdV2,
    HdV3,
    HdV1,
    ArXiv,
}

/// Order in which variants are attempted.
pub const FALLBACK_ORDER: [ModelVariant; 4] = [
    ModelVariant::HdV2,
    ModelVariant::HdV3,
    ModelVariant::HdV1,
    ModelVariant::ArXiv,
];

impl ModelVariant {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::HdV2 => "RIFE_HDv2.onnx",
            Self::HdV3 => "RIFE_HDv3.onnx",
            Self::HdV1 => "RIFE_HD.onnx",
            Self::ArXiv => "RIFE.onnx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::HdV2 => "v2.x HD",
            Self::HdV3 => "v3.x HD",
            Self::HdV1 => "v1.x HD",
            Self::ArXiv => "ArXiv-RIFE",
        }
    }

    /// Whether an export with `format` inputs is a valid build of this variant.
    pub fn accepts(self, format: ModelFormat) -> bool {
        match self {
            Self::HdV3 => matches!(format, ModelFormat::ThreeInput | ModelFormat::Concatenated),
            Self::HdV2 | Self::HdV1 | Self::ArXiv => format == ModelFormat::TwoInput,
        }
    }

    pub fn model_path(self, model_dir: &Path) -> PathBuf {
        model_dir.join(self.file_name())
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Try `load` on each variant in `order`; the first `Ok` wins.
///
/// Variants after the winner are never attempted.
pub fn load_with_fallback<T, F>(
    model_dir: &Path,
    order: &[ModelVariant],
    mut load: F,
) -> Result<(ModelVariant, T), InterpolateError>
where
    F: FnMut(ModelVariant) -> Result<T>,
{
    let mut attempts = Vec::with_capacity(order.len());

    for &variant in order {
        debug!(variant = %variant, "Trying model variant");
        match load(variant) {
            Ok(loaded) => {
                info!(variant = %variant, "Loaded {} model", variant.label());
                return Ok((variant, loaded));
            }
            Err(error) => {
                warn!(variant = %variant, error = %format!("{error:#}"), "Model variant failed to load");
                attempts.push(VariantFailure {
                    variant,
                    reason: format!("{error:#}"),
                });
            }
        }
    }

    Err(InterpolateError::ModelChainExhausted {
        model_dir: model_dir.to_path_buf(),
        attempts,
    })
}

pub struct LoaderConfig<'a> {
    pub model_dir: &'a Path,
    pub backend: InferenceBackend,
    pub trt_cache_dir: &'a Path,
    pub use_iobinding: bool,
}

/// Load one variant as an ONNX session and check its interface.
pub fn load_variant(variant: ModelVariant, config: &LoaderConfig<'_>) -> Result<RifeModel> {
    let model_path = variant.model_path(config.model_dir);
    if !model_path.is_file() {
        bail!("weight file not found: {}", model_path.display());
    }

    let session = build_session(&SessionConfig {
        model_path: &model_path,
        backend: config.backend,
        trt_cache_dir: config.trt_cache_dir,
    })?;

    let Some(format) = session_format(&session) else {
        bail!(
            "unrecognised input signature in {}",
            model_path.display()
        );
    };
    if !variant.accepts(format) {
        bail!("{format} interface is not a {} export", variant.label());
    }

    Ok(RifeModel::new(session, format, config.use_iobinding))
}

/// Run the full chain against `config.model_dir`.
pub fn load_model(config: &LoaderConfig<'_>) -> Result<(ModelVariant, RifeModel), InterpolateError> {
    load_with_fallback(config.model_dir, &FALLBACK_ORDER, |variant| {
        load_variant(variant, config)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_order_is_fixed() {
        assert_eq!(
            FALLBACK_ORDER,
            [
                ModelVariant::HdV2,
                ModelVariant::HdV3,
                ModelVariant::HdV1,
                ModelVariant::ArXiv
            ]
        );
    }

    #[test]
    fn test_first_success_wins_and_later_variants_are_skipped() {
        let mut tried = Vec::new();
        let (variant, loaded) = load_with_fallback(Path::new("m"), &FALLBACK_ORDER, |v| {
            tried.push(v);
            match v {
                ModelVariant::HdV2 => bail!("missing"),
                other => Ok(other.file_name()),
            }
        })
        .unwrap();

        assert_eq!(variant, ModelVariant::HdV3);
        assert_eq!(loaded, "RIFE_HDv3.onnx");
        assert_eq!(tried, vec![ModelVariant::HdV2, ModelVariant::HdV3]);
    }

    #[test]
    fn test_first_variant_success_tries_nothing_else() {
        let mut calls = 0;
        let (variant, _) = load_with_fallback(Path::new("m"), &FALLBACK_ORDER, |_| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(variant, ModelVariant::HdV2);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_last_resort_variant_is_reached() {
        let (variant, _) = load_with_fallback(Path::new("m"), &FALLBACK_ORDER, |v| {
            if v == ModelVariant::ArXiv {
                Ok(())
            } else {
                bail!("no")
            }
        })
        .unwrap();
        assert_eq!(variant, ModelVariant::ArXiv);
    }

    #[test]
    fn test_exhaustion_reports_every_attempt() {
        let err = load_with_fallback::<(), _>(Path::new("train_log"), &FALLBACK_ORDER, |v| {
            bail!("cannot open {}", v.file_name())
        })
        .unwrap_err();

        match &err {
            InterpolateError::ModelChainExhausted {
                model_dir,
                attempts,
            } => {
                assert_eq!(model_dir, Path::new("train_log"));
                let variants: Vec<_> = attempts.iter().map(|a| a.variant).collect();
                assert_eq!(variants, FALLBACK_ORDER.to_vec());
                assert_eq!(attempts[3].reason, "cannot open RIFE.onnx");
            }
            other => panic!("expected ModelChainExhausted, got {other:?}"),
        }

        let message = err.to_string();
        assert!(message.contains("train_log"));
        assert!(message.contains("v2.x HD (cannot open RIFE_HDv2.onnx)"));
        assert!(message.contains("ArXiv-RIFE (cannot open RIFE.onnx)"));
    }

    #[test]
    fn test_missing_weight_files_exhaust_chain_without_touching_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = LoaderConfig {
            model_dir: dir.path(),
            backend: InferenceBackend::Cpu,
            trt_cache_dir: dir.path(),
            use_iobinding: false,
        };

        let err = load_model(&config).err().expect("empty dir should exhaust the chain");
        let InterpolateError::ModelChainExhausted { attempts, .. } = err else {
            panic!("expected ModelChainExhausted");
        };
        assert_eq!(attempts.len(), 4);
        assert!(attempts
            .iter()
            .all(|a| a.reason.starts_with("weight file not found")));
    }

    #[test]
    fn test_variant_interfaces() {
        assert!(ModelVariant::HdV3.accepts(ModelFormat::Concatenated));
        assert!(ModelVariant::HdV3.accepts(ModelFormat::ThreeInput));
        assert!(!ModelVariant::HdV3.accepts(ModelFormat::TwoInput));
        assert!(ModelVariant::HdV2.accepts(ModelFormat::TwoInput));
        assert!(!ModelVariant::ArXiv.accepts(ModelFormat::Concatenated));
    }

    #[test]
    fn test_model_path_joins_dir() {
        assert_eq!(
            ModelVariant::HdV1.model_path(Path::new("train_log")),
            PathBuf::from("train_log/RIFE_HD.onnx")
        );
    }
}
